mod qname;
mod sort_order;
mod value;

pub use qname::*;
pub use sort_order::*;
pub use value::*;
