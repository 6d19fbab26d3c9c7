//! Topology entity to graph mutation translation.
//!
//! Creates nodes and relationships:
//! - (:Device {id})
//! - (:Device)-[:LINK {type}]-(:Device)
//! - (:Host {id, mac, vlan})
//! - (:Host)-[:LINK {type: 'EDGE'}]->(:Device)
//!
//! Nothing here touches the store. Every function returns the ordered
//! mutations for one entity; the caller applies them as one unit.
//! Every statement is an upsert: applying it twice leaves one node or
//! one relationship. Relationship statements look their endpoints up
//! with OPTIONAL MATCH, only MERGE when every endpoint exists, and report
//! which endpoint devices were found, so a dangling reference never
//! materializes a placeholder node.

use std::fmt;

use topograph_core::{DeviceRef, HostRef, LinkRef};

use crate::session::RowSet;

/// `type` of the relationship attaching a host to its device.
pub const HOST_EDGE_TYPE: &str = "EDGE";

/// Column reporting whether an upsert created (1) or matched (0) its target.
pub const CREATED: &str = "created";

/// Column reporting how many nodes a clear removed.
pub const REMOVED: &str = "removed";

/// Columns reporting whether a relationship's device endpoints exist (1) or not (0).
pub const SRC_FOUND: &str = "src_found";
pub const DST_FOUND: &str = "dst_found";
pub const DEVICE_FOUND: &str = "device_found";

const CLEAR_ALL: &str = "MATCH (n) DETACH DELETE n RETURN count(n) AS removed";

const UPSERT_DEVICE: &str = "OPTIONAL MATCH (existing:Device {id: $id})
 WITH count(existing) AS before
 MERGE (d:Device {id: $id})
 RETURN CASE WHEN before = 0 THEN 1 ELSE 0 END AS created";

const UPSERT_LINK: &str = "OPTIONAL MATCH (a:Device {id: $src})
 OPTIONAL MATCH (b:Device {id: $dst})
 OPTIONAL MATCH (a)-[existing:LINK {type: $type}]-(b)
 WITH a, b, count(existing) AS before
 FOREACH (x IN CASE WHEN a IS NULL OR b IS NULL THEN [] ELSE [1] END |
   MERGE (a)-[:LINK {type: $type}]-(b))
 RETURN CASE WHEN a IS NULL OR b IS NULL OR before > 0 THEN 0 ELSE 1 END AS created,
        CASE WHEN a IS NULL THEN 0 ELSE 1 END AS src_found,
        CASE WHEN b IS NULL THEN 0 ELSE 1 END AS dst_found";

const UPSERT_HOST: &str = "OPTIONAL MATCH (existing:Host {id: $id})
 WITH count(existing) AS before
 MERGE (h:Host {id: $id})
 SET h.mac = $mac,
     h.vlan = $vlan
 RETURN CASE WHEN before = 0 THEN 1 ELSE 0 END AS created";

const ATTACH_HOST: &str = "OPTIONAL MATCH (h:Host {id: $host_id})
 OPTIONAL MATCH (d:Device {id: $device_id})
 OPTIONAL MATCH (h)-[existing:LINK {type: $type}]->(d)
 WITH h, d, count(existing) AS before
 FOREACH (x IN CASE WHEN h IS NULL OR d IS NULL THEN [] ELSE [1] END |
   MERGE (h)-[:LINK {type: $type}]->(d))
 RETURN CASE WHEN h IS NULL OR d IS NULL OR before > 0 THEN 0 ELSE 1 END AS created,
        CASE WHEN d IS NULL THEN 0 ELSE 1 END AS device_found";

/// A statement parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<Option<&str>> for ParamValue {
    fn from(s: Option<&str>) -> Self {
        s.map_or(Self::Null, |v| Self::Str(v.to_string()))
    }
}

/// One idempotent graph mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Delete every node and relationship.
    ClearAll,
    UpsertDevice {
        id: String,
    },
    /// No-op unless both Device nodes exist.
    UpsertLink {
        src: String,
        dst: String,
        kind: String,
    },
    UpsertHost {
        id: String,
        mac: Option<String>,
        vlan: Option<String>,
    },
    /// No-op unless both the Host and the Device node exist.
    AttachHost {
        host_id: String,
        device_id: String,
    },
    /// Schema DDL (constraints, indexes). Returns no rows.
    Schema(&'static str),
}

impl Mutation {
    /// Cypher statement template.
    pub fn statement(&self) -> &'static str {
        match self {
            Self::ClearAll => CLEAR_ALL,
            Self::UpsertDevice { .. } => UPSERT_DEVICE,
            Self::UpsertLink { .. } => UPSERT_LINK,
            Self::UpsertHost { .. } => UPSERT_HOST,
            Self::AttachHost { .. } => ATTACH_HOST,
            Self::Schema(statement) => *statement,
        }
    }

    /// Parameters bound into [`Mutation::statement`].
    pub fn params(&self) -> Vec<(&'static str, ParamValue)> {
        match self {
            Self::ClearAll | Self::Schema(_) => Vec::new(),
            Self::UpsertDevice { id } => vec![("id", id.as_str().into())],
            Self::UpsertLink { src, dst, kind } => vec![
                ("src", src.as_str().into()),
                ("dst", dst.as_str().into()),
                ("type", kind.as_str().into()),
            ],
            Self::UpsertHost { id, mac, vlan } => vec![
                ("id", id.as_str().into()),
                ("mac", mac.as_deref().into()),
                ("vlan", vlan.as_deref().into()),
            ],
            Self::AttachHost { host_id, device_id } => vec![
                ("host_id", host_id.as_str().into()),
                ("device_id", device_id.as_str().into()),
                ("type", HOST_EDGE_TYPE.into()),
            ],
        }
    }

    /// Columns of the rows the statement returns.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::ClearAll => &[REMOVED],
            Self::Schema(_) => &[],
            Self::UpsertLink { .. } => &[CREATED, SRC_FOUND, DST_FOUND],
            Self::AttachHost { .. } => &[CREATED, DEVICE_FOUND],
            _ => &[CREATED],
        }
    }

    /// Whether the mutation creates a relationship between existing nodes,
    /// and therefore may leave it out.
    pub fn is_relationship(&self) -> bool {
        matches!(self, Self::UpsertLink { .. } | Self::AttachHost { .. })
    }

    /// Device ids the statement reported as absent, given its rows.
    /// An empty row set means nothing was found.
    pub fn missing_devices<'a>(&'a self, rows: &RowSet) -> Vec<&'a str> {
        let found = |column: &str| rows.first_value(column) == Some(1);
        match self {
            Self::UpsertLink { src, dst, .. } => [(src, SRC_FOUND), (dst, DST_FOUND)]
                .into_iter()
                .filter(|(_, column)| !found(*column))
                .map(|(id, _)| id.as_str())
                .collect(),
            Self::AttachHost { device_id, .. } if !found(DEVICE_FOUND) => vec![device_id.as_str()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params()
            .into_iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = self.statement().split_whitespace().collect::<Vec<_>>().join(" ");
        write!(f, "{} {{{}}}", statement, params)
    }
}

/// Which optional host attributes are written to the Host node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostAttributes {
    /// Only the id is stored.
    #[default]
    IdOnly,
    /// MAC and VLAN are stored when the source reports them.
    Descriptive,
}

/// Delete everything before a full rebuild.
pub fn clear_all() -> Vec<Mutation> {
    vec![Mutation::ClearAll]
}

/// Create the Device node if absent.
pub fn upsert_device(device: &DeviceRef) -> Vec<Mutation> {
    vec![Mutation::UpsertDevice {
        id: device.id.clone(),
    }]
}

/// Create the LINK relationship between two existing Device nodes if absent.
pub fn upsert_link(link: &LinkRef) -> Vec<Mutation> {
    vec![Mutation::UpsertLink {
        src: link.src.clone(),
        dst: link.dst.clone(),
        kind: link.kind.as_str().to_string(),
    }]
}

/// Create the Host node if absent, then attach it to its device.
pub fn upsert_host(host: &HostRef, attributes: HostAttributes) -> Vec<Mutation> {
    let (mac, vlan) = match attributes {
        HostAttributes::IdOnly => (None, None),
        HostAttributes::Descriptive => (host.mac.clone(), host.vlan.clone()),
    };

    vec![
        Mutation::UpsertHost {
            id: host.id.clone(),
            mac,
            vlan,
        },
        Mutation::AttachHost {
            host_id: host.id.clone(),
            device_id: host.device_id.clone(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Row;
    use topograph_core::LinkKind;

    #[test]
    fn test_upsert_device() {
        let mutations = upsert_device(&DeviceRef::new("of:1"));
        assert_eq!(mutations, vec![Mutation::UpsertDevice { id: "of:1".to_string() }]);
        assert!(mutations[0].statement().contains("MERGE (d:Device {id: $id})"));
        assert_eq!(mutations[0].params(), vec![("id", ParamValue::Str("of:1".to_string()))]);
        assert_eq!(mutations[0].columns(), &[CREATED]);
    }

    #[test]
    fn test_upsert_link_matches_devices_only() {
        let mutations = upsert_link(&LinkRef::new("of:1", "of:2", LinkKind::Direct));
        assert_eq!(mutations.len(), 1);

        let statement = mutations[0].statement();
        assert!(statement.contains("OPTIONAL MATCH (a:Device {id: $src})"));
        assert!(statement.contains("OPTIONAL MATCH (b:Device {id: $dst})"));
        // Endpoints are never created by a link.
        assert!(!statement.contains("MERGE (a:"));
        assert!(!statement.contains("MERGE (b:"));
        assert!(mutations[0].is_relationship());
        assert_eq!(mutations[0].columns(), &[CREATED, SRC_FOUND, DST_FOUND]);
        assert!(mutations[0]
            .params()
            .contains(&("type", ParamValue::Str("DIRECT".to_string()))));
    }

    #[test]
    fn test_upsert_host_orders_node_before_edge() {
        let host = HostRef::new("h1", "d1");
        let mutations = upsert_host(&host, HostAttributes::IdOnly);

        assert!(matches!(mutations[0], Mutation::UpsertHost { .. }));
        assert_eq!(
            mutations[1],
            Mutation::AttachHost {
                host_id: "h1".to_string(),
                device_id: "d1".to_string(),
            }
        );
        assert!(!mutations[0].is_relationship());
        assert!(mutations[1].is_relationship());
    }

    #[test]
    fn test_host_attributes() {
        let host = HostRef {
            mac: Some("00:00:00:00:00:01".to_string()),
            vlan: Some("10".to_string()),
            ..HostRef::new("h1", "d1")
        };

        let bare = upsert_host(&host, HostAttributes::IdOnly);
        assert!(bare[0].params().contains(&("mac", ParamValue::Null)));

        let full = upsert_host(&host, HostAttributes::Descriptive);
        assert!(full[0]
            .params()
            .contains(&("mac", ParamValue::Str("00:00:00:00:00:01".to_string()))));
        assert!(full[0].params().contains(&("vlan", ParamValue::Str("10".to_string()))));
    }

    #[test]
    fn test_missing_devices_from_found_flags() {
        let link = upsert_link(&LinkRef::new("a", "b", LinkKind::Direct)).remove(0);
        let only_src = RowSet::single(
            Row::new().with(CREATED, 0).with(SRC_FOUND, 1).with(DST_FOUND, 0),
        );
        assert_eq!(link.missing_devices(&only_src), vec!["b"]);

        let both = RowSet::single(
            Row::new().with(CREATED, 1).with(SRC_FOUND, 1).with(DST_FOUND, 1),
        );
        assert!(link.missing_devices(&both).is_empty());
        assert_eq!(link.missing_devices(&RowSet::empty()), vec!["a", "b"]);

        let attach = upsert_host(&HostRef::new("h1", "d1"), HostAttributes::IdOnly).remove(1);
        let absent = RowSet::single(Row::new().with(CREATED, 0).with(DEVICE_FOUND, 0));
        assert_eq!(attach.missing_devices(&absent), vec!["d1"]);

        let device = upsert_device(&DeviceRef::new("d1")).remove(0);
        assert!(device.missing_devices(&RowSet::empty()).is_empty());
    }

    #[test]
    fn test_translation_is_deterministic() {
        let link = LinkRef::new("a", "b", LinkKind::Edge);
        assert_eq!(upsert_link(&link), upsert_link(&link));
        assert_eq!(clear_all(), vec![Mutation::ClearAll]);
        assert_eq!(Mutation::ClearAll.columns(), &[REMOVED]);
    }

    #[test]
    fn test_display_includes_params() {
        let text = upsert_device(&DeviceRef::new("of:9"))[0].to_string();
        assert!(text.starts_with("OPTIONAL MATCH (existing:Device {id: $id}) WITH"));
        assert!(text.ends_with("{id: \"of:9\"}"));
    }
}
