//! Quality-gate data models.

pub mod analysis;
pub mod ce_task;
pub mod installation;
pub mod project_information;
pub mod version;
