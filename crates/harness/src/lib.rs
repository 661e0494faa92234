mod calendar;
mod cloud;
mod peer;
mod remote;

pub use calendar::FakeCalendar;
pub use cloud::TestCloud;
pub use peer::{TestPeer, test_config};
pub use remote::{InMemoryRemoteStore, RemoteCall};
