//! Wire types of the geosite database.
//!
//! Field numbers follow v2ray's `routercommon.proto`. Unknown fields are
//! skipped by the decoder.

/// Domain attribute
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoAttribute {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(oneof = "AttributeValue", tags = "2, 3")]
    pub typed_value: Option<AttributeValue>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum AttributeValue {
    #[prost(bool, tag = "2")]
    BoolValue(bool),
    #[prost(int64, tag = "3")]
    IntValue(i64),
}

/// Domain entry in a group
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoDomain {
    /// Plain = 0, Regex = 1, Domain = 2, Full = 3
    #[prost(int32, tag = "1")]
    pub domain_type: i32,
    #[prost(string, tag = "2")]
    pub value: String,
    #[prost(message, repeated, tag = "3")]
    pub attribute: Vec<ProtoAttribute>,
}

/// One named group
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoGeoSite {
    #[prost(string, tag = "1")]
    pub country_code: String,
    #[prost(message, repeated, tag = "2")]
    pub domain: Vec<ProtoDomain>,
}

/// The whole database file
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoGeoSiteList {
    #[prost(message, repeated, tag = "1")]
    pub entry: Vec<ProtoGeoSite>,
}
