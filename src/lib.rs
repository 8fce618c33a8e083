#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod config;
pub mod engine;
pub mod listing;
pub mod matcher;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod server;
pub mod session;
pub mod settings;
pub mod slicer;
pub mod view;
pub mod xml_builder;
