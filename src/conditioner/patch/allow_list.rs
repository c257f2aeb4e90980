/*
 * Copyright (C) 2024 The Conditioner Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Reports whether `condition_type` may be modified under `allow_list`.
///
/// An empty list places no restriction. Otherwise membership is decided by
/// exact, case-sensitive comparison.
pub fn is_allowed<S: AsRef<str>>(condition_type: &str, allow_list: &[S]) -> bool {
    allow_list.is_empty()
        || allow_list
            .iter()
            .any(|allowed| allowed.as_ref() == condition_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_allows_everything() {
        let empty: [&str; 0] = [];
        for condition_type in ["Ready", "DiskPressure", "", "anything-at-all"] {
            assert!(is_allowed(condition_type, &empty));
        }
    }

    #[test]
    fn non_empty_list_requires_membership() {
        let allow = vec!["Ready".to_string(), "NetworkUnavailable".to_string()];
        assert!(is_allowed("Ready", &allow));
        assert!(is_allowed("NetworkUnavailable", &allow));
        assert!(!is_allowed("DiskPressure", &allow));
        assert!(!is_allowed("", &allow));
    }

    #[test]
    fn membership_is_case_sensitive() {
        let allow = ["Ready"];
        assert!(!is_allowed("ready", &allow));
        assert!(!is_allowed("READY", &allow));
        assert!(!is_allowed("Ready ", &allow));
    }
}
