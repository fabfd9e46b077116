pub(crate) mod element;
pub(crate) mod pool;
pub(crate) mod still;
