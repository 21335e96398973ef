use std::fmt::Debug;
use std::rc::Rc;

/// A value owned by the scripting engine.
///
/// This bridge never inspects an engine's object model directly; every
/// value it touches comes back out through one of these opaque handles.
/// `Clone` must be identity-preserving (cloning a handle must not create a
/// new underlying engine object — §4.B "an engine value passed back through
/// the marshaller preserves identity") and `PartialEq` must compare engine
/// identity, not structural equality.
pub trait EngineValue: Clone + Debug + PartialEq {
    /// True for any value the type-test considers "an object" — the
    /// precondition for an internal-slot lookup or a `.then` probe.
    fn is_object(&self) -> bool;
    fn is_callable(&self) -> bool;
    fn is_undefined(&self) -> bool;
    fn is_null(&self) -> bool;
}

/// A native closure installed into the engine as a callable value. Takes the
/// `this` binding and the call arguments, returns the return value or a
/// thrown value.
pub type NativeFunction<V> = Rc<dyn Fn(&V, &[V]) -> Result<V, V>>;

/// The capability surface this bridge needs from a scripting engine.
///
/// Every method here corresponds to one bullet in §1's "opaque capability"
/// list. No concrete engine is bound by this crate; an embedder supplies an
/// `Engine` impl (backed by whatever interpreter it likes) and the bridge
/// is otherwise engine-agnostic.
pub trait Engine {
    type Value: EngineValue;

    /// Evaluate a script and return its completion value, or the thrown
    /// value on failure.
    fn eval(&mut self, source: &str) -> Result<Self::Value, Self::Value>;

    /// The realm's global object, onto which `bind` installs every host
    /// global listed in §6.
    fn global_object(&mut self) -> Self::Value;

    fn undefined(&self) -> Self::Value;
    fn null(&self) -> Self::Value;
    fn boolean(&self, value: bool) -> Self::Value;
    fn number(&self, value: f64) -> Self::Value;
    fn string(&self, value: &str) -> Self::Value;

    fn create_array(&mut self, items: &[Self::Value]) -> Self::Value;
    /// Creates a plain object from insertion-ordered key/value pairs.
    fn create_object(&mut self, entries: &[(String, Self::Value)]) -> Self::Value;
    fn create_error(&mut self, message: &str) -> Self::Value;

    /// Installs `f` as a callable engine value with the given display name
    /// and declared arity (`Function.length`).
    fn create_function(
        &mut self,
        name: &str,
        arity: u32,
        f: NativeFunction<Self::Value>,
    ) -> Self::Value;

    fn call_function(
        &mut self,
        f: &Self::Value,
        this: &Self::Value,
        args: &[Self::Value],
    ) -> Result<Self::Value, Self::Value>;

    fn get_property(&mut self, obj: &Self::Value, key: &str) -> Option<Self::Value>;
    fn set_property(&mut self, obj: &Self::Value, key: &str, value: Self::Value);

    /// Returns `v`'s own enumerable string-keyed property names, in
    /// insertion order, or an empty vec if `v` is not a plain object (an
    /// array, a function, or any other kind with nothing to enumerate this
    /// way). Internal slots (`get_internal_slot`/`set_internal_slot`) are
    /// never included — they live outside ordinary property space.
    fn get_own_keys(&mut self, v: &Self::Value) -> Vec<String>;

    /// Reads an array's `length` and its indexed elements; `None` if `v` is
    /// not an engine array (callers fall back to the general iterator
    /// protocol, §4.F).
    fn array_length(&mut self, v: &Self::Value) -> Option<u32>;
    fn array_get(&mut self, v: &Self::Value, index: u32) -> Option<Self::Value>;

    fn to_rust_string(&mut self, v: &Self::Value) -> String;
    fn to_rust_number(&mut self, v: &Self::Value) -> f64;
    fn to_rust_bool(&mut self, v: &Self::Value) -> bool;

    /// Reads a hidden slot not reachable by ordinary property lookup, used
    /// to discover the *internal-promise* slot of a wrapped-promise object
    /// (§3) without it being spoofable by script-assigned properties.
    fn get_internal_slot(&mut self, v: &Self::Value, name: &str) -> Option<u64>;
    fn set_internal_slot(&mut self, v: &Self::Value, name: &str, id: u64);
}
