pub mod guards;
pub mod router;
pub mod routes;

pub use router::{FormyChatState, formychat_router};
