pub mod router;

pub use router::{PinsyncState, pinsync_router};
