pub mod clock;
pub mod url;

pub use clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use url::is_valid_url;
