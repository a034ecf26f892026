//! Route and menu access control built on the resolved session role.
//!
//! All route guards funnel through `policy::evaluate`; the menu filter consumes
//! the same role but is not a security boundary.

pub mod policy;
pub mod guard;
pub mod menu;
pub mod navigation;

pub use policy::{AccessRule, Verdict, evaluate};
pub use guard::{GuardMode, GuardOutcome, Location, RouteGuard};
pub use menu::{MenuNode, MenuPolicy, default_menu, filter_menu};
pub use navigation::{GuardKind, Navigation, Navigator, RouteEntry, RouteTable};
