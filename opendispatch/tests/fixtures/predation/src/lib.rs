//! A module for `Registry::load_module`.
//!
//! The host links this crate for the animal types and loads the shared
//! library built from it for the overriders. The module declares the
//! `encounter` method itself, so the method outlives the module only when
//! the host declares it as well.

use opendispatch::{AsAny, ClassRef, Next, Unit};

pub trait Animal: AsAny {
    fn name(&self) -> &'static str;
}

pub struct Herbivore;
pub struct Carnivore;
pub struct Cow;
pub struct Wolf;

impl Animal for Herbivore {
    fn name(&self) -> &'static str {
        "herbivore"
    }
}

impl Animal for Carnivore {
    fn name(&self) -> &'static str {
        "carnivore"
    }
}

impl Animal for Cow {
    fn name(&self) -> &'static str {
        "cow"
    }
}

impl Animal for Wolf {
    fn name(&self) -> &'static str {
        "wolf"
    }
}

pub type EncounterNext<'a> = Next<'a, dyn Animal, (), String, 2>;

fn run(_: &EncounterNext<'_>, _: [&dyn Animal; 2], _: ()) -> String {
    "run".to_string()
}

fn hunt(_: &EncounterNext<'_>, _: [&dyn Animal; 2], _: ()) -> String {
    "hunt".to_string()
}

#[no_mangle]
pub fn opendispatch_register(unit: &mut Unit<'_>) {
    let animal = ClassRef::of::<dyn Animal>();
    let encounter = unit.method::<dyn Animal, (), String, 2>("encounter", [animal, animal]);
    unit.overrider(
        encounter,
        [ClassRef::of::<Herbivore>(), ClassRef::of::<Carnivore>()],
        run,
    )
    .overrider(
        encounter,
        [ClassRef::of::<Carnivore>(), ClassRef::of::<Herbivore>()],
        hunt,
    );
}
