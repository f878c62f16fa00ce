//! Units contributed by shared libraries.
//!
//! A module exports a registration function under [`REGISTER_SYMBOL`]:
//!
//! ```ignore
//! #[no_mangle]
//! pub fn opendispatch_register(unit: &mut opendispatch::Unit<'_>) {
//!     let animal = ClassRef::of::<dyn Animal>();
//!     let encounter = unit.method::<dyn Animal, (), String, 2>("encounter", [animal, animal]);
//!     unit.overrider(encounter, [ClassRef::of::<Cow>(), ClassRef::of::<Wolf>()], run);
//! }
//! ```
//!
//! The library stays mapped until [`Registry::unload_module`] has removed
//! its records. Methods it declared that other units also declared survive
//! the unload.

use std::path::{Path, PathBuf};

use libloading::Library;
use thiserror::Error;

use super::{Registry, Unit, UnitId};

/// Name of the registration entry point, nul-terminated.
pub const REGISTER_SYMBOL: &[u8] = b"opendispatch_register\0";

/// Signature of the registration entry point.
pub type RegisterFn = for<'a, 'r> unsafe extern "Rust" fn(&'a mut Unit<'r>);

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to load module {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("module {} has no registration entry point: {source}", path.display())]
    Symbol {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("failed to close module {}: {source}", path.display())]
    Close {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("unit {0:?} was not loaded from a module")]
    NotLoaded(UnitId),
}

pub(crate) struct LoadedModule {
    unit: UnitId,
    path: PathBuf,
    library: Library,
}

impl Registry {
    /// Load the shared library at `path` and run its registration entry
    /// point in a unit named after the path.
    ///
    /// The registry is left uninitialized.
    ///
    /// # Safety
    ///
    /// The library's initializers and its `opendispatch_register` symbol run
    /// unchecked. The symbol must have the [`RegisterFn`] signature and the
    /// library must be built against the same version of this crate.
    pub unsafe fn load_module(&mut self, path: impl AsRef<Path>) -> Result<UnitId, ModuleError> {
        let path = path.as_ref();
        // SAFETY: upheld by the caller.
        let library = unsafe { Library::new(path) }.map_err(|source| ModuleError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: the caller guarantees the symbol's type.
        let register = unsafe { library.get::<RegisterFn>(REGISTER_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(|source| ModuleError::Symbol {
                path: path.to_path_buf(),
                source,
            })?;

        let id = self.unit_id(&path.display().to_string());
        self.invalidate();
        {
            let mut unit = Unit::new(self, id);
            // SAFETY: `library` is alive and outlives the records it adds.
            unsafe { register(&mut unit) };
        }
        tracing::info!(path = %path.display(), unit = id.index(), "module loaded");

        self.modules.push(LoadedModule {
            unit: id,
            path: path.to_path_buf(),
            library,
        });
        Ok(id)
    }

    /// Remove the records of a unit loaded by [`Registry::load_module`],
    /// then close its library.
    pub fn unload_module(&mut self, unit: UnitId) -> Result<(), ModuleError> {
        let index = self
            .modules
            .iter()
            .position(|module| module.unit == unit)
            .ok_or(ModuleError::NotLoaded(unit))?;
        let module = self.modules.remove(index);
        self.unload(unit);
        tracing::info!(path = %module.path.display(), "module unloaded");
        module.library.close().map_err(|source| ModuleError::Close {
            path: module.path,
            source,
        })
    }

    /// Units loaded from shared libraries, with their paths.
    pub fn modules(&self) -> impl Iterator<Item = (UnitId, &Path)> {
        self.modules.iter().map(|module| (module.unit, module.path.as_path()))
    }
}
