pub mod insert;
pub mod list;
pub mod run;

pub use insert::{handle_insert_command, InsertArgs};
pub use list::{handle_list_command, ListArgs};
pub use run::{handle_run_command, RunArgs};
