pub(crate) mod chapters;
pub(crate) mod errors;
pub(crate) mod gamification;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod practice;
pub(crate) mod router;
pub(crate) mod validation;
