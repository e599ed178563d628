use crate::config::MachineKind;
use crate::machine::{ArcadeMachine, Machine};
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;
use std::marker::PhantomData;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error serializing/deserializing state: {source}")]
    Serialization {
        #[from]
        source: bincode::Error,
    },
    #[error("error reading/writing state: {source}")]
    FileSystem {
        #[from]
        source: io::Error,
    },
    #[error("save state is for {actual}, running machine is {expected}")]
    MachineMismatch {
        expected: MachineKind,
        actual: MachineKind,
    },
}

pub fn serialize_array<S, T, const N: usize>(
    array: &[T; N],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut state = serializer.serialize_tuple(N)?;
    for value in array {
        state.serialize_element(value)?;
    }
    state.end()
}

struct DeserializeArrayVisitor<T, const N: usize> {
    marker: PhantomData<T>,
}

impl<T, const N: usize> DeserializeArrayVisitor<T, N> {
    fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<'de, T, const N: usize> Visitor<'de> for DeserializeArrayVisitor<T, N>
where
    T: Deserialize<'de> + Default + Copy,
{
    type Value = [T; N];

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "an array of size {N}")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut array = [T::default(); N];

        for (i, value) in array.iter_mut().enumerate() {
            let Some(elem) = seq.next_element()? else {
                return Err(de::Error::custom(format!(
                    "expected array to have {N} elements, only got {i}",
                )));
            };

            *value = elem;
        }

        if seq.next_element::<T>()?.is_some() {
            return Err(de::Error::custom(format!(
                "array has more than {N} elements",
            )));
        }

        Ok(array)
    }
}

pub fn deserialize_array<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + Copy,
{
    deserializer.deserialize_tuple(N, DeserializeArrayVisitor::new())
}

pub fn save_state<P>(machine: &ArcadeMachine, path: P) -> Result<(), SaveStateError>
where
    P: AsRef<Path>,
{
    let serialized_state = bincode::serialize(machine)?;
    fs::write(path.as_ref(), serialized_state)?;

    log::info!(
        "Successfully wrote {} save state to '{}'",
        machine.kind(),
        path.as_ref().display()
    );

    Ok(())
}

/// Load a save state over `existing_machine`, which supplies the state that is not serialized.
/// On failure the existing machine is handed back untouched.
pub fn load_state<P>(
    path: P,
    existing_machine: ArcadeMachine,
) -> Result<ArcadeMachine, (SaveStateError, Box<ArcadeMachine>)>
where
    P: AsRef<Path>,
{
    let serialized_state = match fs::read(path.as_ref()) {
        Ok(serialized_state) => serialized_state,
        Err(err) => return Err((err.into(), Box::new(existing_machine))),
    };
    let mut machine: ArcadeMachine = match bincode::deserialize(&serialized_state) {
        Ok(machine) => machine,
        Err(err) => return Err((err.into(), Box::new(existing_machine))),
    };

    if machine.kind() != existing_machine.kind() {
        return Err((
            SaveStateError::MachineMismatch {
                expected: existing_machine.kind(),
                actual: machine.kind(),
            },
            Box::new(existing_machine),
        ));
    }

    machine.move_unserializable_fields_from(existing_machine);

    log::info!(
        "Successfully loaded save state from '{}'",
        path.as_ref().display()
    );

    Ok(machine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MachineConfig, Rotation};
    use crate::graphics::decode::{
        decode_gfx, encode_pixels, RawGraphicsRom, BLITTER_GFX_HALF, BLITTER_GFX_SIZE,
    };
    use crate::machine::{mrdo, Arabian, MrDo};
    use crate::memory::MemoryBus;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("jarcade-{}-{name}.ss0", std::process::id()))
    }

    fn arabian() -> ArcadeMachine {
        let mut gfx = vec![0; BLITTER_GFX_SIZE];
        let (v1, v2) = encode_pixels([5, 6, 7, 9]);
        gfx[0x20] = v1;
        gfx[0x20 + BLITTER_GFX_HALF] = v2;

        let config = MachineConfig {
            kind: MachineKind::Arabian,
            rotation: Rotation::Rot0,
        };
        Arabian::new(
            config,
            &[0xAA; 0x8000],
            RawGraphicsRom::new(gfx).expect("fixture is full size"),
        )
        .into()
    }

    fn mrdo() -> ArcadeMachine {
        let chars = decode_gfx(&mrdo::CHAR_LAYOUT, &[0; mrdo::CHAR_ROM_SIZE]).expect("size");
        let sprites = decode_gfx(&mrdo::SPRITE_LAYOUT, &[0; mrdo::SPRITE_ROM_SIZE]).expect("size");
        MrDo::new(
            MachineConfig::new(MachineKind::MrDo),
            &[0; mrdo::PROGRAM_ROM_SIZE],
            chars.clone(),
            chars,
            sprites,
        )
        .into()
    }

    #[test]
    fn array_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(
                serialize_with = "serialize_array",
                deserialize_with = "deserialize_array"
            )]
            values: [u16; 40],
        }

        let mut values = [0; 40];
        values[39] = 0xBEEF;
        let bytes = bincode::serialize(&Wrapper { values }).expect("serialize");
        let wrapper: Wrapper = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(values, wrapper.values);
    }

    #[test]
    fn save_and_load_restores_state() {
        let path = temp_path("restore");

        let mut machine = arabian();
        machine.write(0xD100, 0x42);
        // Blit source 0x20 to (0, 0) on plane A
        for (address, value) in (0xE000..).zip([0x01, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00]) {
            machine.write(address, value);
        }
        machine.render_frame();
        save_state(&machine, &path).expect("save state");

        let fresh = arabian();
        assert_eq!(0x00, fresh.read(0xD100));
        let mut loaded = load_state(&path, fresh).map_err(|(err, _)| err).expect("load");
        fs::remove_file(&path).ok();

        assert_eq!(0x42, loaded.read(0xD100));
        assert_eq!(&machine.frame().row(0)[..4], &loaded.frame().row(0)[..4]);

        // Decode tables and graphics came over from the fresh machine
        assert_eq!(0xAA, loaded.read(0x0000));
        for (address, value) in (0xE008..).zip([0x01, 0x20, 0x00, 0x08, 0x00, 0x00, 0x00]) {
            loaded.write(address, value);
        }
        loaded.render_frame();
        assert_eq!(&[5, 6, 7, 9], &loaded.frame().row(8)[..4]);
    }

    #[test]
    fn load_rejects_other_machine() {
        let path = temp_path("mismatch");
        save_state(&arabian(), &path).expect("save state");

        let result = load_state(&path, mrdo());
        fs::remove_file(&path).ok();

        let Err((err, existing)) = result else {
            panic!("loading an Arabian state into Mr. Do! should fail");
        };
        assert!(matches!(
            err,
            SaveStateError::MachineMismatch {
                expected: MachineKind::MrDo,
                actual: MachineKind::Arabian
            }
        ));
        assert_eq!(MachineKind::MrDo, existing.kind());
    }

    #[test]
    fn load_missing_file() {
        let result = load_state(temp_path("missing"), mrdo());
        assert!(matches!(result, Err((SaveStateError::FileSystem { .. }, _))));
    }
}
