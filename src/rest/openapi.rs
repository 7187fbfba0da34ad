// rest/openapi.rs — OpenAPI 3.1 spec for the task API.
//
// Served at GET /api/openapi.json. Hand-maintained: the API surface is five
// routes over one entity, so a generator would be more machinery than spec.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

pub async fn openapi_spec(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let port = ctx.config.port;
    Json(json!({
        "openapi": "3.1.0",
        "info": {
            "title": "todod REST API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "CRUD over a single Task entity, backed by SQLite.",
            "license": { "name": "MIT" }
        },
        "servers": [
            { "url": format!("http://localhost:{port}"), "description": "Local server" }
        ],
        "components": {
            "schemas": {
                "Task": {
                    "type": "object",
                    "required": ["id", "title", "description", "isCompleted"],
                    "properties": {
                        "id": { "type": "string", "description": "Opaque unique identifier, assigned at creation" },
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "isCompleted": { "type": "boolean" }
                    }
                },
                "TaskDraft": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Optional; generated when absent" },
                        "title": { "type": "string", "default": "" },
                        "description": { "type": "string", "default": "" },
                        "isCompleted": { "type": "boolean", "default": false }
                    }
                },
                "Error": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } }
                }
            }
        },
        "paths": {
            "/api/task": {
                "get": {
                    "operationId": "listTasks",
                    "summary": "List every task",
                    "responses": {
                        "200": {
                            "description": "All tasks, insertion order",
                            "content": { "application/json": { "schema": {
                                "type": "array", "items": { "$ref": "#/components/schemas/Task" }
                            } } }
                        }
                    }
                },
                "post": {
                    "operationId": "createTask",
                    "summary": "Insert a task",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/TaskDraft" } } }
                    },
                    "responses": {
                        "201": {
                            "description": "Stored task; Location header points at GET /api/task/{id}",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Task" } } }
                        }
                    }
                }
            },
            "/api/task/{id}": {
                "parameters": [
                    { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                ],
                "get": {
                    "operationId": "getTask",
                    "summary": "Fetch one task",
                    "responses": {
                        "200": {
                            "description": "The task",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Task" } } }
                        },
                        "404": {
                            "description": "No task with this id",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
                        }
                    }
                },
                "put": {
                    "operationId": "updateTask",
                    "summary": "Replace a task (full record)",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Task" } } }
                    },
                    "responses": {
                        "204": { "description": "Updated" },
                        "400": { "description": "Body id does not match path id" },
                        "404": { "description": "No task with this id" }
                    }
                },
                "delete": {
                    "operationId": "deleteTask",
                    "summary": "Remove a task permanently",
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": { "description": "No task with this id" }
                    }
                }
            },
            "/api/health": {
                "get": {
                    "operationId": "getHealth",
                    "summary": "Liveness check",
                    "responses": { "200": { "description": "Server is up" } }
                }
            }
        }
    }))
}
