pub mod audit;
pub mod config;
pub mod deployment;
pub mod directory;
pub mod domain;
pub mod error;
pub mod provider;
pub mod resolution;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod templates;

pub use config::Config;
pub use deployment::{
    Caller, DeploymentEngine, DeploymentRequest, DeploymentSummary, DeploymentTarget, TargetMode,
};
pub use error::DeployError;
pub use resolution::{ContextOverrides, TemplateResolutionService};
pub use resolver::{resolve, EvaluationContext};
pub use rules::{EmailType, SignatureRule};
pub use store::{Deployment, DeploymentStatus, UserDeploymentHistory};
