pub mod domain;
pub mod metrics;
pub mod ports;
pub mod risk;

pub use domain::{
    AuthSession, ChatMessage, ChatSession, CheckoutPreference, CheckoutRequest, PaymentInfo,
    PaymentMetadata, SentimentAnalysis, SentimentDistribution, SessionBundle, SessionMetrics,
    SessionSummary, SummaryContent, User, UserCredentials,
};
pub use ports::{
    ChatCompletionService, DatabaseService, PaymentGateway, PortError, PortResult,
    SummaryGenerationService,
};
