pub mod pump_portal;
pub mod supervisor;

pub use pump_portal::{CreationHandler, FeedConnector, FeedStream, PumpPortalConnector, StreamIngestor};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
