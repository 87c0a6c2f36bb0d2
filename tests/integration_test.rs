mod common;
mod lifecycle_flow;
mod registry_flow;
mod subscription_flow;
