mod httpproxy;
mod route;
mod virtualservice;

pub use httpproxy::*;
pub use route::*;
pub use virtualservice::*;
