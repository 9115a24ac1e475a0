//! Minimal module for exercising real library reloads.
//!
//! Both builds share one state layout and differ only in [`BUILD`], which
//! every entry point stamps into the state it touches.

use kiln_module::{App, AppHost, UpdateSignal};
use kiln_services::AppInput;

#[cfg(not(feature = "second-build"))]
pub const BUILD: u32 = 1;
#[cfg(feature = "second-build")]
pub const BUILD: u32 = 2;

#[repr(C)]
pub struct FixtureState {
    pub created_by: u32,
    pub reloaded_by: u32,
    pub last_update_by: u32,
    pub updates: u32,
}

impl App for FixtureState {
    fn init(_host: &AppHost<'_>) -> Self {
        FixtureState {
            created_by: BUILD,
            reloaded_by: 0,
            last_update_by: 0,
            updates: 0,
        }
    }

    fn update(&mut self, _host: &AppHost<'_>, _input: &AppInput) -> UpdateSignal {
        self.last_update_by = BUILD;
        self.updates += 1;
        UpdateSignal::Continue
    }

    fn reloaded(&mut self, _host: &AppHost<'_>) {
        self.reloaded_by = BUILD;
    }
}

kiln_module::export_app!(FixtureState);
