// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod input_profile;
pub mod sampler;
pub mod xml;

pub use input_profile::{InputProfile, InputProfileValue, InputProfileVariable};
pub use sampler::InputProfileSampler;
pub use xml::{load_profile, save_profile};

/// List the input profiles, i.e., the `.xml` files, in a directory, sorted by name.
pub fn list_profiles(dir: &str) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut profiles = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|x| x.eq_ignore_ascii_case("xml")) {
            profiles.push(path);
        }
    }
    profiles.sort();
    Ok(profiles)
}
