use crate::data::ResourceData;
use crate::types::{ResFlags, ResourceType};

/// A named, typed and reference-counted resource.
///
/// A resource is eligible for reclamation once both its user and internal
/// reference counts are zero; it is only freed by an explicit sweep.
#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) res_type: ResourceType,
    pub(crate) name: String,
    pub(crate) flags: ResFlags,
    pub(crate) loaded: bool,
    /// Loading was attempted without data; excluded from unloaded queries.
    pub(crate) data_absent: bool,
    pub(crate) user_refs: u32,
    pub(crate) internal_refs: u32,
    pub(crate) data: ResourceData,
}

impl Resource {
    pub(crate) fn new(res_type: ResourceType, name: String, flags: ResFlags) -> Self {
        Self {
            res_type,
            name,
            flags,
            loaded: false,
            data_absent: false,
            user_refs: 0,
            internal_refs: 0,
            data: ResourceData::default_for(res_type),
        }
    }

    #[must_use]
    pub fn res_type(&self) -> ResourceType {
        self.res_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn flags(&self) -> ResFlags {
        self.flags
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn user_refs(&self) -> u32 {
        self.user_refs
    }

    #[must_use]
    pub fn internal_refs(&self) -> u32 {
        self.internal_refs
    }

    #[must_use]
    pub fn data(&self) -> &ResourceData {
        &self.data
    }

    /// Returns `true` if nothing references the resource any more.
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.user_refs == 0 && self.internal_refs == 0
    }

    pub(crate) fn is_queryable(&self) -> bool {
        !self.loaded && !self.data_absent && !self.flags.contains(ResFlags::NO_QUERY)
    }
}
