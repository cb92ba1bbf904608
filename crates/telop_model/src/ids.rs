// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unique identifiers for model entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a project
    ProjectId
);
entity_id!(
    /// Unique identifier for a layer
    LayerId
);
entity_id!(
    /// Unique identifier for a template
    TemplateId
);
entity_id!(
    /// Unique identifier for a played-out template instance
    InstanceId
);
entity_id!(
    /// Unique identifier for an element
    ElementId
);
entity_id!(
    /// Unique identifier for an animation
    AnimationId
);
entity_id!(
    /// Unique identifier for a binding
    BindingId
);
