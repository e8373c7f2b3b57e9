pub mod headless;

pub use headless::{free_port, launch_headless_browser, BrowserSession, LaunchOptions};
