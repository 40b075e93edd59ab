pub mod authoring;
pub mod menu;
pub mod results;
pub mod taking;
