//! Generates `COMMIT_ID` and `BUILD_REL_DATE` for the plugin metadata in
//! `gst::plugin_define!`.

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

fn main() {
    gst_plugin_version_helper::info()
}
