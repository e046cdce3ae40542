pub mod earnings;
pub mod submissions;
