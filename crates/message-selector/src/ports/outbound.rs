//! Outbound Ports (Driven Ports)
//!
//! Evaluation reads message properties, the topic and the QoS through this
//! trait; ACL membership for `aclcheck` and `@` is answered here too.

use crate::domain::Value;

/// Message properties seen by a selector (Driven Port)
pub trait PropertySource {
    /// Value of a property, `None` when the message does not carry it
    fn property(&self, name: &str) -> Option<Value>;

    fn topic(&self) -> Option<&str> {
        None
    }

    fn qos(&self) -> u8 {
        0
    }

    /// Whether `key` is in the ACL named `acl`; `None` when the ACL is
    /// unknown.
    fn check_acl(&self, _acl: &str, _key: &str) -> Option<bool> {
        None
    }
}
