//! In-process broadcast messaging.
//!
//! The broker is an explicitly constructed, owned component with a clear
//! start/stop lifecycle; a handle to it is passed into every component that
//! publishes or subscribes. It owns no durable state: a message published
//! while no subscriber is attached is lost to the topic, which is an
//! accepted, bounded loss covered by the call outbox.

mod broker;

pub use broker::{
    Broker, BrokerError, BrokerOptions, CallAnnouncement, Delivery, EnrollmentAnnouncement,
    Subscription, CALLS_TOPIC, ENROLLMENTS_TOPIC,
};
