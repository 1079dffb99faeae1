// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK. Every trait method calls into the ART runtime
// through the `Context` that hosts the native code; nothing is cached on the
// Rust side apart from the `JavaVM` handle.
//
// Runtime resources are ordinary string/bool resources generated by the
// build tooling: `runtime_url`, `native_dependencies` (a JSON object) and
// `cookie_encryption`. A missing resource reads as "not configured".

#![cfg(target_os = "android")]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use jni::objects::{JObject, JString, JValue};
use jni::{JNIEnv, JavaVM};

use mxnative_core::error::{MxNativeError, Result};

use crate::traits::*;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Prefix applied to all SharedPreferences keys to avoid collisions.
const PREFS_KEY_PREFIX: &str = "mxnative_";

/// SharedPreferences file name.
const PREFS_FILE: &str = "mxnative_secrets";

/// Name of the OTA root, created next to `filesDir`.
const OTA_DIR_NAME: &str = "Ota";

const BUNDLE_FILE_NAME: &str = "index.android.bundle";

/// `Base64.NO_WRAP`
const BASE64_NO_WRAP: i32 = 2;

/// `Context.MODE_PRIVATE`
const MODE_PRIVATE: i32 = 0;

/// The process-wide `JavaVM`, obtained once from the NDK glue.
fn java_vm() -> Result<&'static JavaVM> {
    static VM: OnceLock<JavaVM> = OnceLock::new();
    if let Some(vm) = VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| MxNativeError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(VM.get_or_init(|| vm))
}

/// A [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| MxNativeError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// The hosting `Context` (usually the Activity).
fn context() -> Result<JObject<'static>> {
    let ctx = ndk_context::android_context();
    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(MxNativeError::Bridge(
            "Android context is null, native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

fn jni_err(context: &str, e: jni::errors::Error) -> MxNativeError {
    MxNativeError::Bridge(format!("{context}: {e}"))
}

/// Call a no-arg method returning an object.
fn call_object<'a>(
    env: &mut JNIEnv<'a>,
    target: &JObject<'_>,
    name: &str,
    sig: &str,
) -> Result<JObject<'a>> {
    env.call_method(target, name, sig, &[])
        .map_err(|e| jni_err(name, e))?
        .l()
        .map_err(|e| jni_err(name, e))
}

fn java_string(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<String> {
    Ok(env
        .get_string(&JString::from(obj))
        .map_err(|e| jni_err("get_string", e))?
        .into())
}

/// `file.getAbsolutePath()` as a [`PathBuf`].
fn absolute_path(env: &mut JNIEnv<'_>, file: &JObject<'_>) -> Result<PathBuf> {
    let path = call_object(env, file, "getAbsolutePath", "()Ljava/lang/String;")?;
    Ok(PathBuf::from(java_string(env, path)?))
}

fn package_name(env: &mut JNIEnv<'_>, context: &JObject<'_>) -> Result<String> {
    let name = call_object(env, context, "getPackageName", "()Ljava/lang/String;")?;
    java_string(env, name)
}

/// Look up a generated resource id. `None` when the resource is not packaged.
fn resource_id<'a>(
    env: &mut JNIEnv<'a>,
    context: &JObject<'_>,
    name: &str,
    kind: &str,
) -> Result<Option<(JObject<'a>, i32)>> {
    let resources = call_object(
        env,
        context,
        "getResources",
        "()Landroid/content/res/Resources;",
    )?;
    let package = package_name(env, context)?;
    let j_name = env.new_string(name).map_err(|e| jni_err("new_string(name)", e))?;
    let j_kind = env.new_string(kind).map_err(|e| jni_err("new_string(kind)", e))?;
    let j_package = env
        .new_string(&package)
        .map_err(|e| jni_err("new_string(package)", e))?;

    let id = env
        .call_method(
            &resources,
            "getIdentifier",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)I",
            &[
                JValue::Object(&j_name),
                JValue::Object(&j_kind),
                JValue::Object(&j_package),
            ],
        )
        .map_err(|e| jni_err("Resources.getIdentifier", e))?
        .i()
        .map_err(|e| jni_err("getIdentifier->i", e))?;

    Ok((id != 0).then_some((resources, id)))
}

fn string_resource(name: &str) -> Result<Option<String>> {
    let mut env = jni_env()?;
    let context = context()?;
    let Some((resources, id)) = resource_id(&mut env, &context, name, "string")? else {
        tracing::debug!(name, "Android: string resource not packaged");
        return Ok(None);
    };
    let value = env
        .call_method(
            &resources,
            "getString",
            "(I)Ljava/lang/String;",
            &[JValue::Int(id)],
        )
        .map_err(|e| jni_err("Resources.getString", e))?
        .l()
        .map_err(|e| jni_err("getString->l", e))?;
    java_string(&mut env, value).map(Some)
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the platform bridge.
///
/// Zero-sized; all state lives on the Java side.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Does not touch JNI; the first call happens when a trait method runs.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }
}

// ---------------------------------------------------------------------------
// NativeAppInfo -- PackageManager / Context directories
// ---------------------------------------------------------------------------

impl NativeAppInfo for AndroidBridge {
    /// `versionName-versionCode` from the installed package info.
    fn app_version(&self) -> Result<String> {
        let mut env = jni_env()?;
        let context = context()?;

        let package = package_name(&mut env, &context)?;
        let j_package = env
            .new_string(&package)
            .map_err(|e| jni_err("new_string(package)", e))?;
        let manager = call_object(
            &mut env,
            &context,
            "getPackageManager",
            "()Landroid/content/pm/PackageManager;",
        )?;
        let info = env
            .call_method(
                &manager,
                "getPackageInfo",
                "(Ljava/lang/String;I)Landroid/content/pm/PackageInfo;",
                &[JValue::Object(&j_package), JValue::Int(0)],
            )
            .map_err(|e| jni_err("PackageManager.getPackageInfo", e))?
            .l()
            .map_err(|e| jni_err("getPackageInfo->l", e))?;

        let name = env
            .get_field(&info, "versionName", "Ljava/lang/String;")
            .map_err(|e| jni_err("PackageInfo.versionName", e))?
            .l()
            .map_err(|e| jni_err("versionName->l", e))?;
        let name = if name.is_null() {
            String::new()
        } else {
            java_string(&mut env, name)?
        };
        let code = env
            .call_method(&info, "getLongVersionCode", "()J", &[])
            .map_err(|e| jni_err("PackageInfo.getLongVersionCode", e))?
            .j()
            .map_err(|e| jni_err("getLongVersionCode->j", e))?;

        Ok(format!("{name}-{code}"))
    }

    fn app_identifier(&self) -> Result<String> {
        let mut env = jni_env()?;
        let context = context()?;
        package_name(&mut env, &context)
    }

    fn documents_dir(&self) -> Result<PathBuf> {
        let mut env = jni_env()?;
        let context = context()?;
        let dir = call_object(&mut env, &context, "getFilesDir", "()Ljava/io/File;")?;
        absolute_path(&mut env, &dir)
    }

    fn cache_dir(&self) -> Result<PathBuf> {
        let mut env = jni_env()?;
        let context = context()?;
        let dir = call_object(&mut env, &context, "getCacheDir", "()Ljava/io/File;")?;
        absolute_path(&mut env, &dir)
    }

    /// `<filesDir parent>/Ota`, outside the directory the JS file module
    /// can write to.
    fn ota_dir(&self) -> Result<PathBuf> {
        let files = self.documents_dir()?;
        let parent = files
            .parent()
            .ok_or_else(|| MxNativeError::Bridge("filesDir has no parent".into()))?;
        Ok(parent.join(OTA_DIR_NAME))
    }

    fn bundle_file_name(&self) -> &str {
        BUNDLE_FILE_NAME
    }
}

// ---------------------------------------------------------------------------
// NativeKeychain -- SharedPreferences (MODE_PRIVATE)
// ---------------------------------------------------------------------------

impl NativeKeychain for AndroidBridge {
    /// Store a secret in SharedPreferences, Base64-encoded.
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut env = jni_env()?;
        let context = context()?;
        let alias = format!("{PREFS_KEY_PREFIX}{key}");

        tracing::info!(alias = %alias, "Android: storing secret in SharedPreferences");

        let j_bytes = env
            .byte_array_from_slice(value)
            .map_err(|e| jni_err("byte_array_from_slice(value)", e))?;
        let encoded: JObject = env
            .call_static_method(
                "android/util/Base64",
                "encodeToString",
                "([BI)Ljava/lang/String;",
                &[JValue::Object(&j_bytes), JValue::Int(BASE64_NO_WRAP)],
            )
            .map_err(|e| jni_err("Base64.encodeToString", e))?
            .l()
            .map_err(|e| jni_err("encodeToString->l", e))?;

        let editor = preferences_editor(&mut env, &context)?;
        let j_alias: JString = env
            .new_string(&alias)
            .map_err(|e| jni_err("new_string(alias)", e))?;

        env.call_method(
            &editor,
            "putString",
            "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/SharedPreferences$Editor;",
            &[JValue::Object(&j_alias), JValue::Object(&encoded)],
        )
        .map_err(|e| jni_err("editor.putString", e))?;

        // commit() rather than apply(): the key must be durable before it
        // encrypts anything.
        env.call_method(&editor, "commit", "()Z", &[])
            .map_err(|e| jni_err("editor.commit", e))?;
        Ok(())
    }

    /// Returns `Ok(None)` if the key does not exist.
    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut env = jni_env()?;
        let context = context()?;
        let alias = format!("{PREFS_KEY_PREFIX}{key}");

        let prefs = shared_preferences(&mut env, &context)?;
        let j_alias: JString = env
            .new_string(&alias)
            .map_err(|e| jni_err("new_string(alias)", e))?;

        let encoded: JObject = env
            .call_method(
                &prefs,
                "getString",
                "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;",
                &[JValue::Object(&j_alias), JValue::Object(&JObject::null())],
            )
            .map_err(|e| jni_err("getString", e))?
            .l()
            .map_err(|e| jni_err("getString->l", e))?;

        if encoded.is_null() {
            tracing::debug!(alias = %alias, "Android: secret not found");
            return Ok(None);
        }

        let decoded: JObject = env
            .call_static_method(
                "android/util/Base64",
                "decode",
                "(Ljava/lang/String;I)[B",
                &[JValue::Object(&encoded), JValue::Int(BASE64_NO_WRAP)],
            )
            .map_err(|e| jni_err("Base64.decode", e))?
            .l()
            .map_err(|e| jni_err("decode->l", e))?;

        let bytes = env
            .convert_byte_array(jni::objects::JByteArray::from(decoded))
            .map_err(|e| jni_err("convert_byte_array(decoded)", e))?;
        Ok(Some(bytes))
    }

    /// Silently succeeds if the key does not exist.
    fn delete_secret(&self, key: &str) -> Result<()> {
        let mut env = jni_env()?;
        let context = context()?;
        let alias = format!("{PREFS_KEY_PREFIX}{key}");

        tracing::info!(alias = %alias, "Android: deleting secret from SharedPreferences");

        let editor = preferences_editor(&mut env, &context)?;
        let j_alias: JString = env
            .new_string(&alias)
            .map_err(|e| jni_err("new_string(alias)", e))?;

        env.call_method(
            &editor,
            "remove",
            "(Ljava/lang/String;)Landroid/content/SharedPreferences$Editor;",
            &[JValue::Object(&j_alias)],
        )
        .map_err(|e| jni_err("editor.remove", e))?;

        env.call_method(&editor, "commit", "()Z", &[])
            .map_err(|e| jni_err("editor.commit", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NativeRuntimeResources -- generated res/values
// ---------------------------------------------------------------------------

impl NativeRuntimeResources for AndroidBridge {
    fn runtime_url(&self) -> Result<Option<String>> {
        Ok(string_resource("runtime_url")?.filter(|url| !url.trim().is_empty()))
    }

    fn native_dependencies(&self) -> Result<BTreeMap<String, String>> {
        match string_resource("native_dependencies")? {
            Some(raw) => parse_native_dependencies(&raw),
            None => Ok(BTreeMap::new()),
        }
    }

    fn cookie_encryption_enabled(&self) -> Result<bool> {
        let mut env = jni_env()?;
        let context = context()?;
        let Some((resources, id)) = resource_id(&mut env, &context, "cookie_encryption", "bool")?
        else {
            return Ok(false);
        };
        env.call_method(&resources, "getBoolean", "(I)Z", &[JValue::Int(id)])
            .map_err(|e| jni_err("Resources.getBoolean", e))?
            .z()
            .map_err(|e| jni_err("getBoolean->z", e))
    }
}

/// `context.getSharedPreferences("mxnative_secrets", MODE_PRIVATE)`
fn shared_preferences<'a>(env: &mut JNIEnv<'a>, context: &JObject<'_>) -> Result<JObject<'a>> {
    let j_name: JString = env
        .new_string(PREFS_FILE)
        .map_err(|e| jni_err("new_string(prefs_name)", e))?;

    env.call_method(
        context,
        "getSharedPreferences",
        "(Ljava/lang/String;I)Landroid/content/SharedPreferences;",
        &[JValue::Object(&j_name), JValue::Int(MODE_PRIVATE)],
    )
    .map_err(|e| jni_err("getSharedPreferences", e))?
    .l()
    .map_err(|e| jni_err("getSharedPreferences->l", e))
}

fn preferences_editor<'a>(env: &mut JNIEnv<'a>, context: &JObject<'_>) -> Result<JObject<'a>> {
    let prefs = shared_preferences(env, context)?;
    call_object(
        env,
        &prefs,
        "edit",
        "()Landroid/content/SharedPreferences$Editor;",
    )
}
