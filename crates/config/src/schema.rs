// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! JSON Schema definitions for values serde only sees as strings

use schemars::{
    JsonSchema,
    r#gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject, SubschemaValidation},
};

/// The host a Redis server listens on: a DNS name, or an IPv4 or IPv6
/// address
pub struct RedisHost;

impl JsonSchema for RedisHost {
    fn schema_name() -> String {
        "RedisHost".to_owned()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        let any_of = ["hostname", "ipv4", "ipv6"]
            .into_iter()
            .map(|format| {
                Schema::Object(SchemaObject {
                    instance_type: Some(InstanceType::String.into()),
                    format: Some(format.to_owned()),
                    ..SchemaObject::default()
                })
            })
            .collect();

        Schema::Object(SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                any_of: Some(any_of),
                ..SubschemaValidation::default()
            })),
            ..SchemaObject::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::RootConfig;

    #[test]
    fn test_root_schema() {
        let schema = schemars::schema_for!(RootConfig);
        let schema = serde_json::to_value(&schema).unwrap();
        let definitions = &schema["definitions"];

        let formats: Vec<_> = definitions["RedisHost"]["anyOf"]
            .as_array()
            .unwrap()
            .iter()
            .map(|schema| schema["format"].as_str().unwrap())
            .collect();
        assert_eq!(formats, ["hostname", "ipv4", "ipv6"]);

        let redis = &definitions["RedisConfig"]["properties"];
        assert_eq!(redis["key"]["minLength"], 1);
        assert_eq!(redis["port"]["maximum"], 65535.0);
    }
}
