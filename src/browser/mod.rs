//! Browser session management: identity pool, profile isolation, Chrome
//! launch, and the `AutomationSurface` seam the engine drives pages through.

pub mod identity;
pub mod launch;
pub mod profile;
pub mod session;
pub mod stealth;
pub mod surface;

pub use identity::{BrowserIdentity, USER_AGENTS};
pub use profile::BrowserProfile;
pub use session::{BrowserSession, CdpSessionFactory};
pub use surface::{AutomationSurface, SessionFactory, WaitPolicy};
