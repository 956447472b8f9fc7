pub mod api;
pub mod rtc;
