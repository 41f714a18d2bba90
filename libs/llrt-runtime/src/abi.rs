//! The entry points generated code links against.
//!
//! There is one process-wide [`Runtime`]. Fatal errors end the process here;
//! error objects are handed to the unwinder registered with [`rt_set_unwinder`].
#![allow(improper_ctypes_definitions)]

use std::process::abort;
use std::slice::from_raw_parts;

use llrt_core::Kind;
use llrt_gc::{FrameMark, GCStatistics, GcRef};
use parking_lot::{const_mutex, Mutex};
use tracing::{error, trace};

use crate::config::from_env;
use crate::{
	check, ArrayRef, Class, DispatchTable, Failure, ObjectModel, ObjectRef, Runtime, RuntimeError,
};

/// Raises an error object in the running program and never returns.
pub type Unwinder = extern "C" fn(ObjectRef) -> !;

static RUNTIME: Mutex<Option<Runtime>> = const_mutex(None);
static UNWINDER: Mutex<Option<Unwinder>> = const_mutex(None);

/// Installs a runtime built by the host, replacing any previous one.
pub fn install(runtime: Runtime) {
	*RUNTIME.lock() = Some(runtime);
}

/// Takes the installed runtime out again.
pub fn uninstall() -> Option<Runtime> {
	RUNTIME.lock().take()
}

fn fatal(error: impl std::fmt::Display) -> ! {
	error!(target: "gc", "PANIC: {error}");
	eprintln!("PANIC: {error}");
	abort()
}

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> Result<R, RuntimeError>) -> R {
	let result = {
		let mut guard = RUNTIME.lock();
		match guard.as_mut() {
			Some(runtime) => f(runtime),
			None => Err(RuntimeError::NotStarted),
		}
	};
	match result {
		Ok(value) => value,
		Err(error) => fatal(error),
	}
}

/// Runs a check, raising whatever error object it produces.
fn checked(f: impl FnOnce(&mut Runtime) -> Result<(), Failure>) {
	let result = with_runtime(|runtime| Ok(f(runtime)));
	match result {
		Ok(()) => {}
		Err(Failure::Exception(exception)) => throw(exception),
		Err(Failure::Fatal(error)) => fatal(error),
	}
}

fn throw(exception: ObjectRef) -> ! {
	if let Some(initializer) = exception.class().and_then(|class| class.initializer()) {
		// The constructor may allocate and calls back into the runtime.
		let frame = with_runtime(|runtime| {
			let frame = runtime.gc.open_frame();
			runtime.gc.push_operand(exception.gc_ref())?;
			Ok(frame)
		});
		initializer(exception, exception.vtable());
		with_runtime(|runtime| Ok(runtime.gc.close_frame(frame)?));
	}

	let unwinder = *UNWINDER.lock();
	match unwinder {
		Some(unwinder) => unwinder(exception),
		None => {
			eprintln!("{}", check::uncaught(exception));
			abort()
		}
	}
}

/// Starts the runtime with the bootstrap classes and the configuration from the environment.
#[no_mangle]
pub extern "C" fn rt_startup() {
	llrt_core::init();
	let mut guard = RUNTIME.lock();
	if guard.is_some() {
		return;
	}
	let config = match from_env() {
		Ok(config) => config,
		Err(error) => fatal(format!("{error:?}")),
	};
	match Runtime::bootstrap(&config) {
		Ok(runtime) => *guard = Some(runtime),
		Err(error) => fatal(error),
	}
}

#[no_mangle]
pub extern "C" fn rt_set_unwinder(unwinder: Unwinder) {
	*UNWINDER.lock() = Some(unwinder);
}

#[no_mangle]
pub extern "C" fn gcalloc(size: usize) -> ObjectRef {
	with_runtime(|runtime| runtime.allocate(size))
}

#[no_mangle]
pub extern "C" fn rt_new(class: &'static Class) -> ObjectRef {
	with_runtime(|runtime| runtime.new_object(class))
}

#[no_mangle]
pub extern "C" fn rt_initobj(object: ObjectRef, class: &'static Class) {
	with_runtime(|runtime| {
		runtime.init_object(object, class);
		Ok(())
	})
}

/// # Safety
/// `dims` must point at `ndims` dimension sizes, outermost first.
#[no_mangle]
pub unsafe extern "C" fn new_array(
	kind: u8,
	element: Option<&'static Class>,
	ndims: i32,
	dims: *const i32,
) -> ArrayRef {
	with_runtime(|runtime| {
		let kind = Kind::from_tag(kind).ok_or(RuntimeError::UnknownKind(kind))?;
		if ndims <= 0 || dims.is_null() {
			return Err(RuntimeError::NoDimensions);
		}
		let dims = from_raw_parts(dims, ndims as usize);
		runtime.new_array(kind, element, dims)
	})
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn arrayOf(class: &'static Class) -> &'static Class {
	with_runtime(|runtime| Ok(runtime.classes.array_of(class)))
}

#[no_mangle]
pub extern "C" fn rt_openframe() -> usize {
	with_runtime(|runtime| Ok(runtime.gc.open_frame().depth()))
}

#[no_mangle]
pub extern "C" fn rt_closeframe(mark: usize) {
	trace!(target: "gc", "closeframe {mark}");
	with_runtime(|runtime| Ok(runtime.gc.close_frame(FrameMark::from_depth(mark))?))
}

#[no_mangle]
pub extern "C" fn rt_pushref(object: ObjectRef) {
	with_runtime(|runtime| Ok(runtime.gc.push_operand(object.gc_ref())?))
}

#[no_mangle]
pub extern "C" fn rt_popref() {
	with_runtime(|runtime| {
		runtime.gc.pop_operand()?;
		Ok(())
	})
}

/// # Safety
/// `cell` must stay valid until the frame it was registered in is closed.
#[no_mangle]
pub unsafe extern "C" fn rt_localcell(cell: *mut ObjectRef) {
	with_runtime(|runtime| Ok(runtime.gc.register_local(cell as *mut GcRef<ObjectModel>)?))
}

/// # Safety
/// `cell` must stay valid for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn rt_addroot(cell: *mut ObjectRef) {
	with_runtime(|runtime| Ok(runtime.gc.add_static_root(cell as *mut GcRef<ObjectModel>)?))
}

#[no_mangle]
pub extern "C" fn rt_gc() -> GCStatistics {
	with_runtime(|runtime| Ok(runtime.gc()))
}

#[no_mangle]
pub extern "C" fn rt_issubclass(sup: &'static Class, sub: &'static Class) -> bool {
	check::is_subclass(sup, sub)
}

#[no_mangle]
pub extern "C" fn rt_isinstance(object: ObjectRef, class: &'static Class) -> bool {
	check::is_instance(object, class)
}

#[no_mangle]
pub extern "C" fn rt_iface_cast(
	object: ObjectRef,
	interface: &'static Class,
) -> Option<&'static DispatchTable> {
	match check::iface_vtable(object, interface) {
		Ok(vtable) => vtable,
		Err(error) => fatal(error),
	}
}

#[no_mangle]
pub extern "C" fn rt_loadvtable(object: ObjectRef) -> Option<&'static DispatchTable> {
	check::load_vtable(object)
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn rt_assertNotNull(object: ObjectRef) {
	checked(|runtime| runtime.assert_not_null(object))
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn rt_assertArrayBounds(array: ArrayRef, index: i32) {
	checked(|runtime| runtime.assert_array_bounds(array, index))
}

#[no_mangle]
pub extern "C" fn rt_init_loop() -> ! {
	fatal(check::init_loop())
}

#[no_mangle]
pub extern "C" fn rt_printexception(object: ObjectRef) {
	eprintln!("{}", check::uncaught(object));
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ClassTable, CoreClasses};
	use llrt_gc::GcConfig;

	// The only test touching the process-wide runtime.
	#[test]
	fn entry_points() {
		llrt_core::init();
		let core = CoreClasses::bootstrap().unwrap();
		install(Runtime::new(&GcConfig::default(), ClassTable::new(core)));

		let object = rt_new(core.object);
		assert!(rt_isinstance(object, core.object));
		assert!(std::ptr::eq(
			rt_loadvtable(object).unwrap(),
			core.object.vtable()
		));

		let raw = gcalloc(core.object.instance_size());
		rt_initobj(raw, core.object);
		assert!(raw.class().unwrap().same(core.object));

		let mark = rt_openframe();
		rt_pushref(object);
		rt_pushref(raw);
		rt_popref();
		let mut cell = raw;
		unsafe { rt_localcell(&mut cell) };
		let stats = rt_gc();
		assert_eq!(stats.objects_remaining, 2);
		rt_closeframe(mark);

		let dims = [2, 3];
		let array = unsafe { new_array(Kind::Int as u8, None, 2, dims.as_ptr()) };
		assert_eq!(array.length(), 2);
		let ints = with_runtime(|runtime| Ok(runtime.classes.primitive_array(Kind::Int)));
		assert!(array.class().unwrap().same(arrayOf(ints.unwrap())));
		rt_assertArrayBounds(array, 1);
		rt_assertNotNull(object);

		let stats = rt_gc();
		assert_eq!(stats.objects_remaining, 0);
		assert!(uninstall().is_some());
	}
}
