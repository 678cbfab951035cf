pub mod command_parser;
pub mod command_registry;
pub mod replies;

pub use command_parser::{parse_command, ChatCommand};
pub use command_registry::{find_command, CommandSpec, COMMANDS, COMMAND_PREFIX};
