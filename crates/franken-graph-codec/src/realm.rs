//! The realm: object heap, intrinsics, global object, symbol table and the
//! well-known registry, plus the operations that need all of them at once
//! (property get/set with accessor invocation, call, construct, and
//! compiling callables from source).

use serde::{Deserialize, Serialize};

use crate::ast::{FunctionBody, FunctionKind, FunctionNode};
use crate::callable;
use crate::interpreter::{RuntimeError, RuntimeResult, call_node, to_display_string, to_number};
use crate::object_model::{
    ClassData, FunctionData, JsValue, NativeFunction, ObjectHandle, ObjectHeap, ObjectKind,
    PropertyDescriptor, PropertyKey, SymbolRegistry, WellKnownSymbol,
};
use crate::parser;
use crate::payload::{DEFAULT_MEDIA_TYPE, OpaqueData};
use crate::well_known::WellKnownRegistry;

// ---------------------------------------------------------------------------
// RealmConfig
// ---------------------------------------------------------------------------

/// Configuration for script execution inside a realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Nested call limit; exceeding it raises `CallDepthExceeded`.
    pub max_call_depth: u32,
    /// Live expression evaluations across all active calls; exceeding it
    /// raises `EvaluationTooDeep`.
    pub max_evaluation_depth: u32,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 24,
            max_evaluation_depth: 128,
        }
    }
}

// ---------------------------------------------------------------------------
// Intrinsics
// ---------------------------------------------------------------------------

/// Handles of the objects every realm creates up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub object_prototype: ObjectHandle,
    pub function_prototype: ObjectHandle,
    pub array_prototype: ObjectHandle,
    pub blob_prototype: ObjectHandle,
    /// `%ArrayIteratorPrototype%`: intrinsic, but reachable from no root.
    pub array_iterator_prototype: ObjectHandle,
    pub object_constructor: ObjectHandle,
    pub blob_constructor: ObjectHandle,
    pub math: ObjectHandle,
    pub global: ObjectHandle,
}

impl Intrinsics {
    /// Roots the well-known registry is discovered from.
    pub fn registry_roots(&self) -> [ObjectHandle; 4] {
        [
            self.global,
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
        ]
    }
}

/// `length` / `name` of a function object.
fn function_meta(value: JsValue) -> PropertyDescriptor {
    PropertyDescriptor::Data {
        value,
        writable: false,
        enumerable: false,
        configurable: true,
    }
}

fn native_function(
    heap: &mut ObjectHeap,
    function_prototype: ObjectHandle,
    native: NativeFunction,
) -> ObjectHandle {
    let handle = heap.alloc_intrinsic(ObjectKind::Native(native), Some(function_prototype));
    heap.install(
        handle,
        "length",
        function_meta(JsValue::Number(f64::from(native.arity()))),
    );
    heap.install(handle, "name", function_meta(JsValue::str(native.name())));
    handle
}

fn install_method(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    function_prototype: ObjectHandle,
    native: NativeFunction,
) {
    let method = native_function(heap, function_prototype, native);
    heap.install(
        target,
        native.name(),
        PropertyDescriptor::data_hidden(JsValue::Object(method)),
    );
}

fn install_constructor(heap: &mut ObjectHeap, constructor: ObjectHandle, prototype: ObjectHandle) {
    heap.install(
        constructor,
        "prototype",
        PropertyDescriptor::data_frozen(JsValue::Object(prototype)),
    );
    heap.install(
        prototype,
        "constructor",
        PropertyDescriptor::data_hidden(JsValue::Object(constructor)),
    );
}

fn install_to_string_tag(heap: &mut ObjectHeap, target: ObjectHandle, tag: &str) {
    heap.install(
        target,
        WellKnownSymbol::ToStringTag.key(),
        function_meta(JsValue::str(tag)),
    );
}

fn create_intrinsics(heap: &mut ObjectHeap) -> Intrinsics {
    let object_prototype = heap.alloc_intrinsic(ObjectKind::Ordinary, None);
    let function_prototype = heap.alloc_intrinsic(ObjectKind::Ordinary, Some(object_prototype));
    let array_prototype = heap.alloc_intrinsic(ObjectKind::Array, Some(object_prototype));
    let blob_prototype = heap.alloc_intrinsic(ObjectKind::Ordinary, Some(object_prototype));
    let array_iterator_prototype =
        heap.alloc_intrinsic(ObjectKind::Ordinary, Some(object_prototype));
    let math = heap.alloc_intrinsic(ObjectKind::Ordinary, Some(object_prototype));
    let global = heap.alloc_intrinsic(ObjectKind::Ordinary, Some(object_prototype));

    let object_constructor =
        native_function(heap, function_prototype, NativeFunction::ObjectConstructor);
    let blob_constructor =
        native_function(heap, function_prototype, NativeFunction::BlobConstructor);
    install_constructor(heap, object_constructor, object_prototype);
    install_constructor(heap, blob_constructor, blob_prototype);

    install_method(heap, object_constructor, function_prototype, NativeFunction::ObjectKeys);
    install_method(heap, array_prototype, function_prototype, NativeFunction::ArrayPush);
    install_method(
        heap,
        array_iterator_prototype,
        function_prototype,
        NativeFunction::ArrayIteratorNext,
    );
    for native in [
        NativeFunction::MathMax,
        NativeFunction::MathMin,
        NativeFunction::MathAbs,
    ] {
        install_method(heap, math, function_prototype, native);
    }

    let size_getter = native_function(heap, function_prototype, NativeFunction::BlobSize);
    heap.install(
        blob_prototype,
        "size",
        PropertyDescriptor::Accessor {
            get: Some(size_getter),
            set: None,
            enumerable: false,
            configurable: true,
        },
    );
    install_to_string_tag(heap, blob_prototype, "Blob");
    install_to_string_tag(heap, math, "Math");
    install_to_string_tag(heap, array_iterator_prototype, "Array Iterator");

    for (name, value) in [
        ("globalThis", global),
        ("Object", object_constructor),
        ("Blob", blob_constructor),
        ("Math", math),
    ] {
        heap.install(
            global,
            name,
            PropertyDescriptor::data_hidden(JsValue::Object(value)),
        );
    }
    heap.install(global, "NaN", PropertyDescriptor::data_frozen(JsValue::Number(f64::NAN)));
    heap.install(
        global,
        "Infinity",
        PropertyDescriptor::data_frozen(JsValue::Number(f64::INFINITY)),
    );

    Intrinsics {
        object_prototype,
        function_prototype,
        array_prototype,
        blob_prototype,
        array_iterator_prototype,
        object_constructor,
        blob_constructor,
        math,
        global,
    }
}

// ---------------------------------------------------------------------------
// Realm
// ---------------------------------------------------------------------------

/// One script environment.
#[derive(Debug)]
pub struct Realm {
    heap: ObjectHeap,
    symbols: SymbolRegistry,
    intrinsics: Intrinsics,
    registry: WellKnownRegistry,
    config: RealmConfig,
    call_depth: u32,
    evaluation_depth: u32,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    pub fn new() -> Self {
        Self::with_config(RealmConfig::default())
    }

    pub fn with_config(config: RealmConfig) -> Self {
        let mut heap = ObjectHeap::new();
        let intrinsics = create_intrinsics(&mut heap);
        let registry = WellKnownRegistry::discover(&heap, &intrinsics.registry_roots());
        Self {
            heap,
            symbols: SymbolRegistry::new(),
            intrinsics,
            registry,
            config,
            call_depth: 0,
            evaluation_depth: 0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolRegistry {
        &mut self.symbols
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn global(&self) -> ObjectHandle {
        self.intrinsics.global
    }

    pub fn registry(&self) -> &WellKnownRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    pub fn is_callable(&self, value: &JsValue) -> bool {
        value
            .as_object()
            .and_then(|handle| self.heap.kind(handle).ok())
            .is_some_and(ObjectKind::is_callable)
    }

    // -- allocation ---------------------------------------------------------

    /// `{}`: an ordinary object inheriting from `Object.prototype`.
    pub fn create_object(&mut self) -> ObjectHandle {
        self.heap
            .alloc(ObjectKind::Ordinary, Some(self.intrinsics.object_prototype))
    }

    /// An ordinary object with an explicit (possibly null) prototype.
    pub fn create_object_with_proto(&mut self, proto: Option<ObjectHandle>) -> ObjectHandle {
        self.heap.alloc(ObjectKind::Ordinary, proto)
    }

    /// `[...values]`.
    pub fn create_array(&mut self, values: Vec<JsValue>) -> RuntimeResult<ObjectHandle> {
        let handle = self
            .heap
            .alloc(ObjectKind::Array, Some(self.intrinsics.array_prototype));
        for value in values {
            self.heap.array_push(handle, value)?;
        }
        Ok(handle)
    }

    /// A blob inheriting from `Blob.prototype`.
    pub fn create_blob(&mut self, data: OpaqueData) -> ObjectHandle {
        self.heap
            .alloc(ObjectKind::Opaque(data), Some(self.intrinsics.blob_prototype))
    }

    // -- property access ----------------------------------------------------

    /// `O[P]`, invoking a getter found along the prototype chain.
    pub fn get(&mut self, handle: ObjectHandle, key: &PropertyKey) -> RuntimeResult<JsValue> {
        match self.heap.find_property(handle, key)? {
            None => Ok(JsValue::Undefined),
            Some((_, PropertyDescriptor::Data { value, .. })) => Ok(value),
            Some((_, PropertyDescriptor::Accessor { get: Some(getter), .. })) => {
                self.call(&JsValue::Object(getter), JsValue::Object(handle), &[])
            }
            Some((_, PropertyDescriptor::Accessor { get: None, .. })) => Ok(JsValue::Undefined),
        }
    }

    /// `O[P] = V` with strict-mode failure semantics.
    pub fn set(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> RuntimeResult<()> {
        match self.heap.find_property(handle, &key)? {
            Some((_, PropertyDescriptor::Accessor { set: Some(setter), .. })) => {
                self.call(&JsValue::Object(setter), JsValue::Object(handle), &[value])?;
                Ok(())
            }
            Some((_, PropertyDescriptor::Accessor { set: None, .. })) => {
                Err(RuntimeError::TypeError(format!(
                    "Cannot set property {key} of #<Object> which has only a getter"
                )))
            }
            Some((_, PropertyDescriptor::Data { writable: false, .. })) => {
                Err(RuntimeError::TypeError(format!(
                    "Cannot assign to read only property '{key}' of object"
                )))
            }
            Some((
                owner,
                PropertyDescriptor::Data {
                    enumerable,
                    configurable,
                    ..
                },
            )) if owner == handle => {
                let desc = PropertyDescriptor::Data {
                    value,
                    writable: true,
                    enumerable,
                    configurable,
                };
                if self.heap.define_property(handle, key.clone(), desc)? {
                    Ok(())
                } else {
                    Err(RuntimeError::TypeError(format!(
                        "Cannot assign to property '{key}' of object"
                    )))
                }
            }
            _ => {
                if self
                    .heap
                    .define_property(handle, key.clone(), PropertyDescriptor::data(value))?
                {
                    Ok(())
                } else {
                    Err(RuntimeError::TypeError(format!(
                        "Cannot add property {key}, object is not extensible"
                    )))
                }
            }
        }
    }

    // -- invocation ---------------------------------------------------------

    fn enter_call(&mut self) -> RuntimeResult<()> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                max: self.config.max_call_depth,
            });
        }
        self.call_depth += 1;
        Ok(())
    }

    fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub(crate) fn enter_evaluation(&mut self) -> RuntimeResult<()> {
        if self.evaluation_depth >= self.config.max_evaluation_depth {
            return Err(RuntimeError::EvaluationTooDeep {
                max: self.config.max_evaluation_depth,
            });
        }
        self.evaluation_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_evaluation(&mut self) {
        self.evaluation_depth = self.evaluation_depth.saturating_sub(1);
    }

    fn object_kind(
        &self,
        callee: &JsValue,
        role: &str,
    ) -> RuntimeResult<(ObjectHandle, ObjectKind)> {
        let handle = callee
            .as_object()
            .ok_or_else(|| RuntimeError::TypeError(format!("{callee} is not a {role}")))?;
        Ok((handle, self.heap.kind(handle)?.clone()))
    }

    /// `F.call(this, ...args)`.
    pub fn call(
        &mut self,
        callee: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> RuntimeResult<JsValue> {
        let (_, kind) = self.object_kind(callee, "function")?;
        self.enter_call()?;
        let result = match kind {
            ObjectKind::Function(data) => call_node(self, &data.node, &data.captures, this, args),
            ObjectKind::Class(class) => Err(RuntimeError::TypeError(format!(
                "Class constructor {} cannot be invoked without 'new'",
                class.name.as_deref().unwrap_or("(anonymous)")
            ))),
            ObjectKind::Native(native) => self.call_native(native, this, args),
            _ => Err(RuntimeError::TypeError(format!("{callee} is not a function"))),
        };
        self.exit_call();
        result
    }

    /// `new F(...args)`.
    pub fn construct(&mut self, callee: &JsValue, args: &[JsValue]) -> RuntimeResult<JsValue> {
        let (handle, kind) = self.object_kind(callee, "constructor")?;
        self.enter_call()?;
        let result = self.construct_kind(callee, handle, kind, args);
        self.exit_call();
        result
    }

    fn construct_kind(
        &mut self,
        callee: &JsValue,
        handle: ObjectHandle,
        kind: ObjectKind,
        args: &[JsValue],
    ) -> RuntimeResult<JsValue> {
        match kind {
            ObjectKind::Function(data) if data.node.kind == FunctionKind::Normal => {
                let instance = self.alloc_instance(handle)?;
                let result = call_node(
                    self,
                    &data.node,
                    &data.captures,
                    JsValue::Object(instance),
                    args,
                )?;
                Ok(if result.is_object() {
                    result
                } else {
                    JsValue::Object(instance)
                })
            }
            ObjectKind::Class(class) => {
                let instance = self.alloc_instance(handle)?;
                if let Some(constructor) = &class.constructor {
                    let scope = class_scope(class.name.as_deref(), handle);
                    let result =
                        call_node(self, constructor, &scope, JsValue::Object(instance), args)?;
                    if result.is_object() {
                        return Ok(result);
                    }
                }
                Ok(JsValue::Object(instance))
            }
            ObjectKind::Native(NativeFunction::ObjectConstructor) => {
                self.call_native(NativeFunction::ObjectConstructor, JsValue::Undefined, args)
            }
            ObjectKind::Native(NativeFunction::BlobConstructor) => self.construct_blob(args),
            _ => Err(RuntimeError::TypeError(format!(
                "{callee} is not a constructor"
            ))),
        }
    }

    fn alloc_instance(&mut self, constructor: ObjectHandle) -> RuntimeResult<ObjectHandle> {
        let proto = match self.get(constructor, &PropertyKey::from("prototype"))? {
            JsValue::Object(proto) => proto,
            _ => self.intrinsics.object_prototype,
        };
        Ok(self.heap.alloc(ObjectKind::Ordinary, Some(proto)))
    }

    fn construct_blob(&mut self, args: &[JsValue]) -> RuntimeResult<JsValue> {
        let mut bytes = Vec::new();
        if let Some(JsValue::Object(parts)) = args.first() {
            let len = self.heap.get(*parts)?.array_length();
            for index in 0..len {
                let part = self.get(*parts, &PropertyKey::String(index.to_string()))?;
                bytes.extend_from_slice(to_display_string(self, &part)?.as_bytes());
            }
        }
        let mut media_type = DEFAULT_MEDIA_TYPE.to_string();
        if let Some(JsValue::Object(options)) = args.get(1)
            && let JsValue::Str(declared) = self.get(*options, &PropertyKey::from("type"))?
            && !declared.is_empty()
        {
            media_type = declared;
        }
        Ok(JsValue::Object(
            self.create_blob(OpaqueData::inline(media_type, bytes)),
        ))
    }

    fn call_native(
        &mut self,
        native: NativeFunction,
        this: JsValue,
        args: &[JsValue],
    ) -> RuntimeResult<JsValue> {
        let arg = |index: usize| args.get(index).cloned().unwrap_or(JsValue::Undefined);
        match native {
            NativeFunction::ObjectConstructor => match arg(0) {
                JsValue::Object(handle) => Ok(JsValue::Object(handle)),
                _ => Ok(JsValue::Object(self.create_object())),
            },
            NativeFunction::BlobConstructor => Err(RuntimeError::type_error(
                "Failed to construct 'Blob': Please use the 'new' operator",
            )),
            NativeFunction::ArrayPush => {
                let handle = this.as_object().ok_or_else(|| {
                    RuntimeError::type_error("Array.prototype.push called on non-object")
                })?;
                let mut len = self.heap.get(handle)?.array_length();
                for value in args {
                    len = self.heap.array_push(handle, value.clone())?;
                }
                Ok(JsValue::Number(f64::from(len)))
            }
            NativeFunction::ArrayIteratorNext => {
                let result = self.create_object();
                self.heap.install(result, "value", PropertyDescriptor::data(JsValue::Undefined));
                self.heap.install(result, "done", PropertyDescriptor::data(JsValue::Bool(true)));
                Ok(JsValue::Object(result))
            }
            NativeFunction::MathMax | NativeFunction::MathMin => {
                let is_max = native == NativeFunction::MathMax;
                let mut acc = if is_max {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                };
                for value in args {
                    let n = to_number(self, value)?;
                    if n.is_nan() {
                        return Ok(JsValue::Number(f64::NAN));
                    }
                    acc = if is_max { acc.max(n) } else { acc.min(n) };
                }
                Ok(JsValue::Number(acc))
            }
            NativeFunction::MathAbs => Ok(JsValue::Number(to_number(self, &arg(0))?.abs())),
            NativeFunction::ObjectKeys => {
                let handle = arg(0).as_object().ok_or_else(|| {
                    RuntimeError::type_error("Object.keys called on non-object")
                })?;
                let keys = self.heap.keys(handle)?;
                let array = self.create_array(keys.into_iter().map(JsValue::Str).collect())?;
                Ok(JsValue::Object(array))
            }
            NativeFunction::BlobSize => {
                let size = this
                    .as_object()
                    .and_then(|handle| self.heap.get(handle).ok())
                    .and_then(|object| match &object.kind {
                        ObjectKind::Opaque(data) => Some(data.len()),
                        _ => None,
                    })
                    .ok_or_else(|| RuntimeError::type_error("Illegal invocation"))?;
                Ok(JsValue::Number(size as f64))
            }
        }
    }

    // -- compilation --------------------------------------------------------

    /// Build a function object from a parsed node. Normal functions get a
    /// fresh `prototype` object whose `constructor` points back.
    pub(crate) fn instantiate_function(
        &mut self,
        source: String,
        node: FunctionNode,
        captures: Vec<(String, JsValue)>,
    ) -> ObjectHandle {
        let base_name = node.name.clone().unwrap_or_default();
        let name = match node.kind {
            FunctionKind::Getter => format!("get {base_name}"),
            FunctionKind::Setter => format!("set {base_name}"),
            _ => base_name,
        };
        let length = node.params.len() as f64;
        let kind = node.kind;
        let handle = self.heap.alloc(
            ObjectKind::Function(FunctionData {
                source,
                node,
                captures,
            }),
            Some(self.intrinsics.function_prototype),
        );
        self.heap.install(handle, "length", function_meta(JsValue::Number(length)));
        self.heap.install(handle, "name", function_meta(JsValue::Str(name)));
        if kind == FunctionKind::Normal {
            let prototype = self
                .heap
                .alloc(ObjectKind::Ordinary, Some(self.intrinsics.object_prototype));
            self.heap.install(
                prototype,
                "constructor",
                PropertyDescriptor::data_hidden(JsValue::Object(handle)),
            );
            self.heap.install(
                handle,
                "prototype",
                PropertyDescriptor::Data {
                    value: JsValue::Object(prototype),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        handle
    }

    /// Compile function, arrow or method source with the given captured
    /// bindings.
    pub fn compile_function(
        &mut self,
        source: &str,
        captures: Vec<(String, JsValue)>,
    ) -> RuntimeResult<ObjectHandle> {
        let node = callable::disassemble(source)?;
        Ok(self.instantiate_function(source.to_string(), node, captures))
    }

    /// Compile a class declaration in an empty scope.
    pub fn compile_class(&mut self, source: &str) -> RuntimeResult<ObjectHandle> {
        let class = parser::parse_class(source)?;
        let prototype = self
            .heap
            .alloc(ObjectKind::Ordinary, Some(self.intrinsics.object_prototype));
        let handle = self.heap.alloc(
            ObjectKind::Class(ClassData {
                source: source.to_string(),
                name: class.name.clone(),
                constructor: class.constructor.clone(),
            }),
            Some(self.intrinsics.function_prototype),
        );
        let length = class
            .constructor
            .as_ref()
            .map_or(0, |constructor| constructor.params.len());
        self.heap.install(
            handle,
            "length",
            function_meta(JsValue::Number(length as f64)),
        );
        self.heap.install(
            handle,
            "name",
            function_meta(JsValue::str(class.name.clone().unwrap_or_default())),
        );
        install_constructor(&mut self.heap, handle, prototype);

        let scope = class_scope(class.name.as_deref(), handle);
        for member in class.members {
            let target = if member.is_static { handle } else { prototype };
            let key = PropertyKey::from(member.function.name.clone().unwrap_or_default());
            let kind = member.function.kind;
            let function = self.instantiate_function(member.source, member.function, scope.clone());
            match kind {
                FunctionKind::Getter | FunctionKind::Setter => {
                    let (mut get, mut set) = match self
                        .heap
                        .get_own_property_descriptor(target, &key)?
                    {
                        Some(PropertyDescriptor::Accessor { get, set, .. }) => (get, set),
                        _ => (None, None),
                    };
                    if kind == FunctionKind::Getter {
                        get = Some(function);
                    } else {
                        set = Some(function);
                    }
                    self.heap.install(
                        target,
                        key,
                        PropertyDescriptor::Accessor {
                            get,
                            set,
                            enumerable: false,
                            configurable: true,
                        },
                    );
                }
                _ => self.heap.install(
                    target,
                    key,
                    PropertyDescriptor::data_hidden(JsValue::Object(function)),
                ),
            }
        }
        Ok(handle)
    }

    /// Run a function body with `bindings` in scope and return its result.
    pub fn run(&mut self, body: &str, bindings: &[(&str, JsValue)]) -> RuntimeResult<JsValue> {
        let node = FunctionNode {
            name: None,
            params: Vec::new(),
            body: FunctionBody::Block(parser::parse_function_body(body)?),
            kind: FunctionKind::Normal,
        };
        let captures: Vec<(String, JsValue)> = bindings
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        self.enter_call()?;
        let result = call_node(self, &node, &captures, JsValue::Undefined, &[]);
        self.exit_call();
        result
    }
}

/// Class bodies see their own name.
fn class_scope(name: Option<&str>, handle: ObjectHandle) -> Vec<(String, JsValue)> {
    name.map(|name| vec![(name.to_string(), JsValue::Object(handle))])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn registry_is_discovered_from_the_global_roots() {
        let realm = Realm::new();
        let intrinsics = *realm.intrinsics();
        let registry = realm.registry();
        assert_eq!(registry.find_index(intrinsics.global), Some(0));
        assert!(registry.find_index(intrinsics.math).is_some());
        assert!(registry.find_index(intrinsics.blob_prototype).is_some());
        assert!(registry.find_index(intrinsics.array_iterator_prototype).is_none());
    }

    #[test]
    fn two_realms_agree_on_registry_indices() {
        let a = Realm::new();
        let b = Realm::new();
        assert_eq!(a.registry().snapshot(), b.registry().snapshot());
    }

    #[test]
    fn object_literals_inherit_from_object_prototype() {
        let mut realm = Realm::new();
        let value = realm.run("return {}", &[]).unwrap();
        let handle = value.as_object().unwrap();
        assert_eq!(
            realm.heap().get_prototype_of(handle).unwrap(),
            Some(realm.intrinsics().object_prototype)
        );
    }

    #[test]
    fn getters_are_invoked_on_read_and_setters_on_write() {
        let mut realm = Realm::new();
        let class = realm
            .compile_class(
                "class Box { constructor(v) { this.v = v } get twice() { return this.v * 2 } set twice(x) { this.v = x / 2 } }",
            )
            .unwrap();
        let instance = realm.construct(&JsValue::Object(class), &[JsValue::Number(4.0)]).unwrap();
        let instance = instance.as_object().unwrap();
        assert_eq!(realm.get(instance, &key("twice")).unwrap(), JsValue::Number(8.0));
        realm.set(instance, key("twice"), JsValue::Number(20.0)).unwrap();
        assert_eq!(realm.get(instance, &key("v")).unwrap(), JsValue::Number(10.0));
    }

    #[test]
    fn getter_only_property_rejects_assignment() {
        let mut realm = Realm::new();
        let class = realm
            .compile_class("class A { get x() { return 1 } }")
            .unwrap();
        let instance = realm.construct(&JsValue::Object(class), &[]).unwrap();
        let err = realm
            .set(instance.as_object().unwrap(), key("x"), JsValue::Number(2.0))
            .unwrap_err();
        assert!(err.to_string().contains("only a getter"));
    }

    #[test]
    fn class_without_new_is_type_error() {
        let mut realm = Realm::new();
        let class = realm.compile_class("class A {}").unwrap();
        let err = realm
            .call(&JsValue::Object(class), JsValue::Undefined, &[])
            .unwrap_err();
        assert!(err.to_string().contains("without 'new'"));
    }

    #[test]
    fn class_prototype_is_frozen_and_methods_hidden() {
        let mut realm = Realm::new();
        let class = realm
            .compile_class("class A { m() { return 1 } static s() { return A } }")
            .unwrap();
        let desc = realm
            .heap()
            .get_own_property_descriptor(class, &key("prototype"))
            .unwrap()
            .unwrap();
        assert!(!desc.is_writable() && !desc.is_configurable());
        let proto = desc.value().and_then(JsValue::as_object).unwrap();
        let method = realm
            .heap()
            .get_own_property_descriptor(proto, &key("m"))
            .unwrap()
            .unwrap();
        assert!(!method.is_enumerable());
        // Static methods see the class binding.
        let s = realm.get(class, &key("s")).unwrap();
        assert_eq!(
            realm.call(&s, JsValue::Object(class), &[]).unwrap(),
            JsValue::Object(class)
        );
    }

    #[test]
    fn normal_functions_get_a_prototype_with_constructor() {
        let mut realm = Realm::new();
        let f = realm
            .compile_function("function Point(x) { this.x = x }", Vec::new())
            .unwrap();
        let proto = realm.get(f, &key("prototype")).unwrap().as_object().unwrap();
        assert_eq!(
            realm.get(proto, &key("constructor")).unwrap(),
            JsValue::Object(f)
        );
        let p = realm
            .construct(&JsValue::Object(f), &[JsValue::Number(3.0)])
            .unwrap();
        assert_eq!(
            realm.get(p.as_object().unwrap(), &key("x")).unwrap(),
            JsValue::Number(3.0)
        );
        assert_eq!(realm.get(f, &key("length")).unwrap(), JsValue::Number(1.0));
        assert_eq!(realm.get(f, &key("name")).unwrap(), JsValue::str("Point"));
    }

    #[test]
    fn arrow_functions_are_not_constructors() {
        let mut realm = Realm::new();
        let f = realm.compile_function("(a) => a", Vec::new()).unwrap();
        let err = realm.construct(&JsValue::Object(f), &[]).unwrap_err();
        assert!(err.to_string().contains("is not a constructor"));
    }

    #[test]
    fn captures_are_visible_to_the_body() {
        let mut realm = Realm::new();
        let f = realm
            .compile_function(
                "function () { return base + 1 }",
                vec![("base".to_string(), JsValue::Number(41.0))],
            )
            .unwrap();
        assert_eq!(
            realm.call(&JsValue::Object(f), JsValue::Undefined, &[]).unwrap(),
            JsValue::Number(42.0)
        );
    }

    #[test]
    fn natives_behave() {
        let mut realm = Realm::new();
        assert_eq!(
            realm.run("return Math.max(1, 7, 3) + Math.abs(-2)", &[]).unwrap(),
            JsValue::Number(9.0)
        );
        assert_eq!(
            realm.run("const a = [1]; a.push(2, 3); return a.length", &[]).unwrap(),
            JsValue::Number(3.0)
        );
        assert_eq!(
            realm.run("return Object.keys({ b: 1, a: 2 }) + ''", &[]).unwrap(),
            JsValue::str("b,a")
        );
        assert_eq!(
            realm.run("return new Blob(['ab', 'c']).size", &[]).unwrap(),
            JsValue::Number(3.0)
        );
        assert_eq!(
            realm.run("return globalThis.Math === Math", &[]).unwrap(),
            JsValue::Bool(true)
        );
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut realm = Realm::with_config(RealmConfig {
            max_call_depth: 8,
            ..RealmConfig::default()
        });
        let f = realm
            .compile_function("function () { return this.again() }", Vec::new())
            .unwrap();
        let receiver = realm.create_object();
        realm
            .set(receiver, key("again"), JsValue::Object(f))
            .unwrap();
        let err = realm
            .call(&JsValue::Object(f), JsValue::Object(receiver), &[])
            .unwrap_err();
        assert_eq!(err, RuntimeError::CallDepthExceeded { max: 8 });
    }

    #[test]
    fn default_config_stops_unbounded_recursion() {
        let mut realm = Realm::new();
        let f = realm
            .compile_function(
                "function (n) { return n === 0 ? 0 : 1 + this.f(n - 1) }",
                Vec::new(),
            )
            .unwrap();
        let o = realm.create_object();
        realm.set(o, key("f"), JsValue::Object(f)).unwrap();

        let shallow = realm
            .call(&JsValue::Object(f), JsValue::Object(o), &[JsValue::Number(10.0)])
            .unwrap();
        assert_eq!(shallow, JsValue::Number(10.0));

        for n in [100.0, 300.0, 20_000.0] {
            let err = realm
                .call(&JsValue::Object(f), JsValue::Object(o), &[JsValue::Number(n)])
                .unwrap_err();
            assert_eq!(err, RuntimeError::CallDepthExceeded { max: 24 });
        }
        // Counters unwind after the failure.
        let again = realm
            .call(&JsValue::Object(f), JsValue::Object(o), &[JsValue::Number(5.0)])
            .unwrap();
        assert_eq!(again, JsValue::Number(5.0));
    }

    #[test]
    fn evaluation_depth_is_bounded() {
        let mut realm = Realm::with_config(RealmConfig {
            max_evaluation_depth: 16,
            ..RealmConfig::default()
        });
        let nested = format!("function () {{ return {}1{} }}", "1 + (".repeat(20), ")".repeat(20));
        let f = realm.compile_function(&nested, Vec::new()).unwrap();
        let err = realm
            .call(&JsValue::Object(f), JsValue::Undefined, &[])
            .unwrap_err();
        assert_eq!(err, RuntimeError::EvaluationTooDeep { max: 16 });
        assert_eq!(err.error_code(), "evaluation_too_deep");
    }

    #[test]
    fn non_extensible_objects_reject_new_properties() {
        let mut realm = Realm::new();
        let o = realm.create_object();
        realm.heap_mut().prevent_extensions(o).unwrap();
        let err = realm.set(o, key("x"), JsValue::Null).unwrap_err();
        assert!(err.to_string().contains("not extensible"));
    }
}
