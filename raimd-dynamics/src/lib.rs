pub mod constants;
pub mod defaults;
pub mod dynamics;
pub mod initialization;
pub mod interface;
pub mod output;
