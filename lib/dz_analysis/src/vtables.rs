//! Textual dump of the vtables of the classes defined by a container.

use crate::classpath::ClassPath;
use crate::errors::AnalysisResult;
use dz_dex::Dex;
use log::{debug, warn};
use std::io::Write;

/// Writes, for every class defined in `dex`, its header line followed by one
/// `index:declaring->signature` line per vtable slot and a blank line.
pub fn dump_vtables<W: Write>(dex: &Dex, class_path: &ClassPath, writer: &mut W) -> AnalysisResult<()> {
    for class in dex.iter_class_defs() {
        let name = class.class_descriptor(dex)?;
        let class = match class_path.class_def(name, false) {
            Ok(class) => class,
            Err(err) => {
                warn!("skipping vtable of {name}: {err}");
                continue;
            }
        };
        let superclass = match class.superclass() {
            Some(uid) => class_path.get(uid)?.name().to_string(),
            None => String::from("null"),
        };

        let vtable = class.vtable();
        debug!("{name}: {} vtable entries", vtable.len());
        writeln!(
            writer,
            "Class {name} extends {superclass} : {} methods",
            vtable.len()
        )?;
        for (i, method) in vtable.iter().enumerate() {
            writeln!(writer, "{i}:{}->{}", method.containing_class, method.method)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
