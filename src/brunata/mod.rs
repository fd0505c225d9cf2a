//! Client side of the Brunata Online provider.

pub mod auth;
pub mod endpoints;
pub mod fetcher;
pub mod gateway;
pub mod pkce;
pub mod settings;

pub use auth::{AuthSession, AuthState, Credentials, TokenSet};
pub use endpoints::{DateRange, ProviderEndpoints};
pub use fetcher::{ConsumptionFetcher, MeterId, MeterInfo};
pub use gateway::{HttpGateway, HttpRequest, HttpResponse, ReqwestGateway};
pub use settings::{HandshakePageParser, HandshakeSettings, ScriptSettingsParser};
