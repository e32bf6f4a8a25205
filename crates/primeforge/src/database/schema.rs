/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel table definitions shared by both backends.
//!
//! Identifiers are stored as text and timestamps as naive UTC values so a
//! single set of definitions serves PostgreSQL and SQLite alike.

diesel::table! {
    requests (id) {
        id -> Text,
        quantity -> Integer,
        digits -> Integer,
        status -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    prime_numbers (id) {
        id -> BigInt,
        request_id -> Text,
        prime_value -> Text,
        task_index -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    task_queue (id) {
        id -> BigInt,
        queue_name -> Text,
        payload -> Text,
        delivery_count -> Integer,
        visible_at -> Timestamp,
        lease_token -> Nullable<Text>,
        leased_by -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(prime_numbers -> requests (request_id));

diesel::allow_tables_to_appear_in_same_query!(requests, prime_numbers, task_queue);
