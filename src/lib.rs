pub mod captcha;
pub mod cookie_jar;
pub mod endpoints;
pub mod html_parser;
pub mod network_client;
