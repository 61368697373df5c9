//! Integration tests for operation extraction.

use serde_json::{json, Value};
use swagger_slice::{
    dereference, extract_operation, locate_operation, repair_refs, DocUrl, ExtractError,
    ExtractOptions, Extractor, ParameterLocation, Schema, Stage, StaticSource,
};

const DOC_URL: &str = "https://h/api/doc.html#/Group/user/getUserUsingGET";

/// A Springfox-style listing with a body parameter, a generic wrapper,
/// a dangling ref and a self-referencing type.
fn shop_document() -> Value {
    json!({
        "swagger": "2.0",
        "info": { "title": "Shop API", "version": "1.0" },
        "host": "h",
        "basePath": "/api",
        "tags": [ { "name": "user" }, { "name": "order" } ],
        "paths": {
            "/users/{id}": {
                "get": {
                    "tags": ["user"],
                    "summary": "Get user",
                    "operationId": "getUserUsingGET",
                    "produces": ["application/json"],
                    "parameters": [
                        { "name": "Authorization", "in": "header", "required": false, "type": "string" },
                        { "name": "id", "in": "path", "required": true, "type": "integer", "format": "int64" }
                    ],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "schema": { "$ref": "#/definitions/Result«UserVO»", "originalRef": "Result«UserVO»" }
                        },
                        "401": { "description": "Unauthorized" }
                    }
                }
            },
            "/users": {
                "post": {
                    "tags": ["user"],
                    "operationId": "createUserUsingPOST",
                    "parameters": [
                        { "name": "dto", "in": "body", "required": true, "schema": { "$ref": "#/definitions/UserDTO" } }
                    ],
                    "responses": {
                        "200": { "description": "OK", "schema": { "$ref": "#/definitions/Result«long»" } }
                    }
                }
            },
            "/orders": {
                "get": {
                    "tags": ["order"],
                    "operationId": "listOrdersUsingGET",
                    "responses": {
                        "200": { "description": "OK", "schema": { "$ref": "#/definitions/OrderPage" } }
                    }
                }
            }
        },
        "definitions": {
            "Result«UserVO»": {
                "type": "object",
                "title": "Result«UserVO»",
                "properties": {
                    "code": { "type": "integer", "format": "int32" },
                    "data": { "$ref": "#/definitions/UserVO", "originalRef": "UserVO" },
                    "msg": { "type": "string" }
                }
            },
            "Result«long»": {
                "type": "object",
                "properties": { "data": { "type": "integer", "format": "int64" } }
            },
            "UserVO": {
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "integer", "format": "int64" },
                    "name": { "type": "string", "description": "display name" },
                    "manager": { "$ref": "#/definitions/UserVO" },
                    "department": { "$ref": "#/definitions/DepartmentVO" }
                }
            },
            "UserDTO": {
                "type": "object",
                "properties": { "name": { "type": "string" } }
            },
            "OrderPage": {
                "type": "object",
                "properties": {
                    "records": { "type": "array", "items": { "$ref": "#/definitions/OrderVO" } }
                }
            }
        }
    })
}

fn extract(document: Value, url: &str) -> Result<swagger_slice::Extraction, ExtractError> {
    Extractor::new(StaticSource::new(document), ExtractOptions::default()).extract(url)
}

// === Identifier Recovery ===

mod identifier_recovery {
    use super::*;

    #[test]
    fn derives_listing_url() {
        let doc = DocUrl::parse(DOC_URL).unwrap();
        assert_eq!(doc.document_url, "https://h/api/v2/api-docs?group=Group");
        assert_eq!(doc.operation_id, "getUserUsingGET");
    }

    #[test]
    fn malformed_url_stage() {
        let err = extract(shop_document(), "https://h/api/doc.html#/Group").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedDocUrl { .. }));
        assert_eq!(err.stage(), Stage::ParsingUrl);
        assert_eq!(err.exit_code(), 2);
    }
}

// === Operation Lookup ===

mod operation_lookup {
    use super::*;

    #[test]
    fn two_paths_one_match() {
        let doc = json!({
            "swagger": "2.0",
            "paths": {
                "/users/{id}": { "get": { "operationId": "getUserUsingGET", "summary": "x" } },
                "/orders": { "get": { "operationId": "listOrdersUsingGET" } }
            }
        });
        let table = locate_operation(&doc, "getUserUsingGET");
        assert_eq!(table.len(), 1);
        assert_eq!(
            table["/users/{id}"],
            json!({ "get": { "operationId": "getUserUsingGET", "summary": "x" } })
        );
    }

    #[test]
    fn unknown_operation_fails() {
        let err = extract(
            shop_document(),
            "https://h/api/doc.html#/Group/user/deleteUserUsingDELETE",
        )
        .unwrap_err();
        match &err {
            ExtractError::OperationNotFound { operation_id, url } => {
                assert_eq!(operation_id, "deleteUserUsingDELETE");
                assert_eq!(url, "https://h/api/v2/api-docs?group=Group");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn narrowed_paths_hold_one_operation() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        assert_eq!(extraction.paths.len(), 1);
        let methods = extraction.paths["/users/{id}"].as_object().unwrap();
        assert_eq!(methods.len(), 1);
        assert!(methods.contains_key("get"));
    }
}

// === Reference Repair ===

mod reference_repair {
    use super::*;

    #[test]
    fn missing_ref_becomes_plain_object() {
        let mut doc = json!({
            "swagger": "2.0",
            "definitions": {},
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "x",
                        "responses": { "200": { "schema": { "$ref": "#/definitions/Missing" } } }
                    }
                }
            }
        });
        repair_refs(&mut doc);
        let schema = &doc["paths"]["/x"]["get"]["responses"]["200"]["schema"];
        assert_eq!(schema, &json!({ "type": "object" }));

        let result = dereference(&doc);
        assert!(result.warnings.is_empty());
        assert_eq!(
            result.value["paths"]["/x"]["get"]["responses"]["200"]["schema"],
            json!({ "type": "object" })
        );
    }

    #[test]
    fn repair_twice_is_repair_once() {
        let mut once = shop_document();
        repair_refs(&mut once);
        let mut twice = once.clone();
        assert!(repair_refs(&mut twice).is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn pipeline_reports_repaired_refs() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let refs: Vec<_> = extraction
            .repaired
            .iter()
            .map(|r| r.reference.as_str())
            .collect();
        assert!(refs.contains(&"#/definitions/DepartmentVO"));
        assert!(refs.contains(&"#/definitions/OrderVO"));
    }
}

// === Dereferencing ===

mod dereferencing {
    use super::*;

    #[test]
    fn response_schema_is_inlined() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let schema = &extraction.paths["/users/{id}"]["get"]["responses"]["200"]["schema"];

        assert_eq!(schema["title"], "Result«UserVO»");
        assert_eq!(schema["properties"]["data"]["properties"]["name"]["type"], "string");
        // Repaired ref is a plain object now
        assert_eq!(
            schema["properties"]["data"]["properties"]["department"],
            json!({ "type": "object" })
        );
    }

    #[test]
    fn self_reference_is_left_as_ref() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let data = &extraction.paths["/users/{id}"]["get"]["responses"]["200"]["schema"]
            ["properties"]["data"];
        assert_eq!(
            data["properties"]["manager"],
            json!({ "$ref": "#/definitions/UserVO" })
        );
        assert_eq!(extraction.circular.len(), 1);
        assert_eq!(
            extraction.circular[0].location,
            "/paths/~1users~1{id}/get/responses/200/schema/properties/data/properties/manager"
        );
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn densely_linked_definitions_finish_quickly() {
        let n = 14;
        let mut definitions = serde_json::Map::new();
        for i in 0..n {
            let properties: serde_json::Map<String, Value> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (format!("dept{j}"), json!({ "$ref": format!("#/definitions/Dept{j}") })))
                .collect();
            definitions.insert(
                format!("Dept{i}"),
                json!({ "type": "object", "properties": properties }),
            );
        }
        let doc = json!({
            "swagger": "2.0",
            "paths": {
                "/depts/{id}": {
                    "get": {
                        "operationId": "getUserUsingGET",
                        "responses": {
                            "200": { "description": "OK", "schema": { "$ref": "#/definitions/Dept0" } }
                        }
                    }
                }
            },
            "definitions": definitions
        });

        let extraction = extract_operation(doc, DocUrl::parse(DOC_URL).unwrap()).unwrap();

        assert_eq!(extraction.circular.len(), (n - 1) * (n - 1));
        let size = serde_json::to_string(&extraction.paths).unwrap().len();
        assert!(size < 50_000, "narrowed paths grew to {size} bytes");
    }

    #[test]
    fn external_ref_becomes_warning_not_error() {
        let doc = json!({
            "swagger": "2.0",
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "getUserUsingGET",
                        "responses": {
                            "200": { "description": "OK", "schema": { "$ref": "common.json#/Error" } }
                        }
                    }
                }
            }
        });
        let extraction = extract(doc, DOC_URL).unwrap();
        assert_eq!(extraction.warnings.len(), 1);
        assert_eq!(extraction.warnings[0].reference, "common.json#/Error");
    }
}

// === Pipeline ===

mod pipeline {
    use super::*;

    #[test]
    fn document_without_version_marker() {
        let mut doc = shop_document();
        doc.as_object_mut().unwrap().remove("swagger");
        let err = extract(doc, DOC_URL).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidDocument { .. }));
        assert_eq!(err.stage(), Stage::ValidatingFormat);
    }

    #[test]
    fn definition_record() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let def = &extraction.definition;

        assert_eq!(def.full_path, "/api/users/{id}");
        assert_eq!(def.method, "GET");
        assert_eq!(def.operation_id, "getUserUsingGET");
        assert_eq!(def.summary.as_deref(), Some("Get user"));
        assert_eq!(def.tags, ["user"]);
        assert_eq!(def.parameters.len(), 2);

        let typed: Vec<_> = def.typed_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(typed, ["id"]);

        let response = def.response.as_ref().unwrap();
        assert_eq!(response.description, "OK");
        let Some(Schema::Object { properties, .. }) = &response.schema else {
            panic!("expected object response, got {:?}", response.schema);
        };
        let data = properties.iter().find(|p| p.name == "data").unwrap();
        assert!(data.schema.has_references());
    }

    #[test]
    fn body_parameter_schema_is_inlined() {
        let extraction = extract(
            shop_document(),
            "https://h/api/doc.html#/Group/user/createUserUsingPOST",
        )
        .unwrap();
        let def = &extraction.definition;
        assert_eq!(def.method, "POST");
        assert_eq!(def.full_path, "/api/users");

        let body = &def.parameters[0];
        assert_eq!(body.location, ParameterLocation::Body);
        assert!(body.required);
        let Some(Schema::Object { properties, .. }) = &body.schema else {
            panic!("expected object body, got {:?}", body.schema);
        };
        assert_eq!(properties[0].name, "name");
        assert!(extraction.circular.is_empty());
    }

    #[test]
    fn serialized_record_shape() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let value = serde_json::to_value(&extraction.definition).unwrap();

        assert_eq!(value["fullPath"], "/api/users/{id}");
        assert_eq!(value["method"], "GET");
        assert_eq!(value["operationId"], "getUserUsingGET");
        assert_eq!(value["parameters"][1]["in"], "path");
        assert_eq!(value["response"]["schema"]["properties"]["code"]["type"], "integer");
        assert!(value["responses"].get("401").is_some());
    }

    #[test]
    fn report_carries_summary_and_diagnostics() {
        let extraction = extract(shop_document(), DOC_URL).unwrap();
        let report = extraction.to_report();
        assert_eq!(report["summary"]["title"], "Shop API");
        assert_eq!(report["summary"]["tags"], json!(["user", "order"]));
        assert_eq!(report["basePath"], "/api");
        assert_eq!(report["circular"].as_array().unwrap().len(), 1);
        assert!(report["paths"].get("/users/{id}").is_some());
    }

    #[test]
    fn openapi3_document() {
        let doc = json!({
            "openapi": "3.0.1",
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "addPet",
                        "requestBody": {
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                        },
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": { "type": "object", "properties": { "name": { "type": "string" } } }
                }
            }
        });
        let extraction = extract(doc, "https://h/doc.html#/default/pet/addPet").unwrap();
        let def = &extraction.definition;
        assert_eq!(def.full_path, "/pets");
        assert_eq!(def.parameters[0].location, ParameterLocation::Body);
        assert!(matches!(
            def.response.as_ref().unwrap().schema,
            Some(Schema::Object { .. })
        ));
    }

    #[test]
    fn document_is_consumed_per_request() {
        let doc_url = DocUrl::parse(DOC_URL).unwrap();
        let a = extract_operation(shop_document(), doc_url.clone()).unwrap();
        let b = extract_operation(shop_document(), doc_url).unwrap();
        assert_eq!(a.paths, b.paths);
        assert_eq!(a.definition, b.definition);
    }

    #[test]
    fn concurrent_extractions_are_independent() {
        let extractor = Extractor::new(StaticSource::new(shop_document()), ExtractOptions::default());
        std::thread::scope(|s| {
            let get = s.spawn(|| extractor.extract(DOC_URL).unwrap());
            let post = s.spawn(|| {
                extractor
                    .extract("https://h/api/doc.html#/Group/user/createUserUsingPOST")
                    .unwrap()
            });
            assert_eq!(get.join().unwrap().definition.method, "GET");
            assert_eq!(post.join().unwrap().definition.method, "POST");
        });
    }
}
