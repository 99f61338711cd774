//! Background lookup of the latest published release.
//!
//! Any failure degrades to "unknown"; the generation flow never waits on it for
//! longer than the grace period passed to [`VersionCheck::finish`].

use std::{
   sync::mpsc::{self, Receiver},
   thread,
   time::Duration,
};

use serde::Deserialize;

pub const CRATES_IO_API: &str = "https://crates.io/api/v1/crates";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct CrateResponse {
   #[serde(rename = "crate")]
   krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
   max_stable_version: Option<String>,
   max_version:        Option<String>,
}

/// Ask the registry at `registry_url` for the newest version of `name`.
pub fn latest_version(registry_url: &str, name: &str) -> Option<String> {
   let client = reqwest::blocking::Client::builder()
      .timeout(LOOKUP_TIMEOUT)
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .ok()?;

   let response = client
      .get(format!("{}/{name}", registry_url.trim_end_matches('/')))
      .send()
      .and_then(reqwest::blocking::Response::error_for_status);

   let body: CrateResponse = match response.and_then(|r| r.json::<CrateResponse>()) {
      Ok(body) => body,
      Err(e) => {
         tracing::debug!(error = %e, "version lookup failed");
         return None;
      },
   };

   body.krate.max_stable_version.or(body.krate.max_version)
}

/// Numeric dotted comparison; pre-release suffixes are ignored.
pub fn is_newer(latest: &str, current: &str) -> bool {
   fn parts(version: &str) -> Vec<u64> {
      version
         .trim()
         .trim_start_matches('v')
         .split(['-', '+'])
         .next()
         .unwrap_or_default()
         .split('.')
         .map(|p| p.parse().unwrap_or(0))
         .collect()
   }

   let (mut latest, mut current) = (parts(latest), parts(current));
   let len = latest.len().max(current.len());
   latest.resize(len, 0);
   current.resize(len, 0);
   latest > current
}

/// Handle to a lookup running on its own thread.
#[derive(Debug)]
pub struct VersionCheck {
   current: String,
   rx:      Receiver<Option<String>>,
}

impl VersionCheck {
   /// Start a lookup against crates.io for this package.
   pub fn spawn(current: &str) -> Self {
      Self::spawn_with(CRATES_IO_API, env!("CARGO_PKG_NAME"), current)
   }

   pub fn spawn_with(registry_url: &str, name: &str, current: &str) -> Self {
      let (tx, rx) = mpsc::channel();
      let registry_url = registry_url.to_string();
      let name = name.to_string();

      thread::spawn(move || {
         tx.send(latest_version(&registry_url, &name)).ok();
      });

      Self { current: current.to_string(), rx }
   }

   /// Wait up to `grace` for the lookup. Returns the latest version only when
   /// it is newer than the running one.
   pub fn finish(self, grace: Duration) -> Option<String> {
      let latest = self.rx.recv_timeout(grace).ok().flatten()?;
      is_newer(&latest, &self.current).then_some(latest)
   }
}
