pub(crate) mod edit;
pub(crate) mod mask;
pub(crate) mod model;
