// Publisher module: due-article publication and its periodic trigger

pub mod engine;
pub mod trigger;

pub use engine::Publisher;
pub use trigger::{PublishTrigger, TriggerHandle};
