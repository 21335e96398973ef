/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `URL`/`URLSearchParams` (§6), parsed with the `url` crate's WHATWG-
//! compliant parser rather than hand-rolled parsing. The `Engine` trait has
//! no accessor/getter concept, so `URL`'s component properties
//! (`href`/`protocol`/`host`/...) are plain data properties recomputed and
//! rewritten onto the object whenever the URL or its `searchParams` change,
//! the same mirroring technique `dom::abort` uses for `signal.aborted`.

use std::cell::RefCell;
use std::rc::Rc;

use url::Url;

use bridge_traits::Engine;

use crate::dom::dom_exception::{self, DomExceptionName};
use crate::global::Bridge;

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> Option<String> {
    args.get(index).map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    install_url(bridge);
    install_url_search_params(bridge);
}

fn install_url<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "URL",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let input = arg_string(&bridge, args, 0).unwrap_or_default();
                let base = arg_string(&bridge, args, 1);
                let parsed = match base {
                    Some(b) => {
                        let base_url = Url::parse(&b).map_err(|err| {
                            dom_exception::make(&bridge, DomExceptionName::NotSupported, &format!("invalid base URL: {err}"))
                        })?;
                        base_url.join(&input).map_err(|err| {
                            dom_exception::make(&bridge, DomExceptionName::NotSupported, &format!("invalid URL: {err}"))
                        })?
                    }
                    None => Url::parse(&input)
                        .map_err(|err| dom_exception::make(&bridge, DomExceptionName::NotSupported, &format!("invalid URL: {err}")))?,
                };
                Ok(make_url_object(&bridge, parsed))
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "URL", ctor));
}

fn set_str<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str, value: &str) {
    let v = bridge.with_engine(|e| e.string(value));
    bridge.with_engine(|e| e.set_property(obj, key, v));
}

fn refresh_url_fields<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, url: &Url) {
    set_str(bridge, obj, "href", url.as_str());
    set_str(bridge, obj, "protocol", &format!("{}:", url.scheme()));
    set_str(bridge, obj, "host", url.host_str().map(|h| format!("{h}{}", port_suffix(url))).unwrap_or_default().as_str());
    set_str(bridge, obj, "hostname", url.host_str().unwrap_or(""));
    set_str(bridge, obj, "port", &url.port().map(|p| p.to_string()).unwrap_or_default());
    set_str(bridge, obj, "pathname", url.path());
    set_str(bridge, obj, "search", url.query().map(|q| format!("?{q}")).unwrap_or_default().as_str());
    set_str(bridge, obj, "hash", url.fragment().map(|f| format!("#{f}")).unwrap_or_default().as_str());
    set_str(bridge, obj, "origin", &url.origin().ascii_serialization());
    set_str(bridge, obj, "username", url.username());
    set_str(bridge, obj, "password", url.password().unwrap_or(""));
}

fn port_suffix(url: &Url) -> String {
    url.port().map(|p| format!(":{p}")).unwrap_or_default()
}

fn make_url_object<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, url: Url) -> E::Value {
    let state = Rc::new(RefCell::new(url));
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    refresh_url_fields(bridge, &obj, &state.borrow());

    let state_for_params = state.clone();
    let bridge_for_params = bridge.clone();
    let obj_for_params = obj.clone();
    let initial_pairs: Vec<(String, String)> = state.borrow().query_pairs().into_owned().collect();
    let on_change: OnChange = Rc::new(move |pairs| {
        let query = encode_pairs(&pairs);
        let mut url = state_for_params.borrow_mut();
        url.set_query(if query.is_empty() { None } else { Some(&query) });
        refresh_url_fields(&bridge_for_params, &obj_for_params, &url);
    });
    let search_params = make_search_params_object(bridge, initial_pairs, Some(on_change));
    bridge.with_engine(|e| e.set_property(&obj, "searchParams", search_params));

    let state_for_to_string = state.clone();
    let bridge_for_to_string = bridge.clone();
    let to_string_fn = bridge.with_engine(|e| {
        e.create_function(
            "toString",
            0,
            Rc::new(move |_this, _args| {
                Ok(bridge_for_to_string.with_engine(|e| e.string(state_for_to_string.borrow().as_str())))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "toString", to_string_fn));

    obj
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    serializer.finish()
}

fn install_url_search_params<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "URLSearchParams",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let pairs = match args.first() {
                    Some(v) => parse_init(&bridge, v),
                    None => Vec::new(),
                };
                Ok(make_search_params_object(&bridge, pairs, None))
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "URLSearchParams", ctor));
}

fn parse_init<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, value: &E::Value) -> Vec<(String, String)> {
    if let Some(len) = bridge.with_engine(|e| e.array_length(value)) {
        let mut out = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Some(pair) = bridge.with_engine(|e| e.array_get(value, i)) {
                if let Some(pair_len) = bridge.with_engine(|e| e.array_length(&pair)) {
                    if pair_len >= 2 {
                        let k = bridge.with_engine(|e| e.array_get(&pair, 0));
                        let v = bridge.with_engine(|e| e.array_get(&pair, 1));
                        if let (Some(k), Some(v)) = (k, v) {
                            out.push((
                                bridge.with_engine(|e| e.to_rust_string(&k)),
                                bridge.with_engine(|e| e.to_rust_string(&v)),
                            ));
                        }
                    }
                }
            }
        }
        return out;
    }
    let text = bridge.with_engine(|e| e.to_rust_string(value));
    let text = text.strip_prefix('?').unwrap_or(&text);
    url::form_urlencoded::parse(text.as_bytes()).into_owned().collect()
}

type OnChange = Rc<dyn Fn(Vec<(String, String)>)>;

fn make_search_params_object<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    initial: Vec<(String, String)>,
    on_change: Option<OnChange>,
) -> E::Value {
    let pairs: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(initial));
    let obj = bridge.with_engine(|e| e.create_object(&[]));

    let notify: Rc<dyn Fn()> = {
        let pairs = pairs.clone();
        Rc::new(move || {
            if let Some(cb) = &on_change {
                cb(pairs.borrow().clone());
            }
        })
    };

    let pairs_for_append = pairs.clone();
    let notify_for_append = notify.clone();
    let bridge_for_append = bridge.clone();
    let append_fn = bridge.with_engine(|e| {
        e.create_function(
            "append",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_append.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                let value = arg_string(&bridge, args, 1).unwrap_or_default();
                pairs_for_append.borrow_mut().push((key, value));
                notify_for_append();
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "append", append_fn));

    let pairs_for_set = pairs.clone();
    let notify_for_set = notify.clone();
    let bridge_for_set = bridge.clone();
    let set_fn = bridge.with_engine(|e| {
        e.create_function(
            "set",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_set.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                let value = arg_string(&bridge, args, 1).unwrap_or_default();
                let mut list = pairs_for_set.borrow_mut();
                let mut replaced = false;
                list.retain_mut(|(k, v)| {
                    if *k != key {
                        return true;
                    }
                    if replaced {
                        return false;
                    }
                    *v = value.clone();
                    replaced = true;
                    true
                });
                if !replaced {
                    list.push((key, value));
                }
                drop(list);
                notify_for_set();
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "set", set_fn));

    let pairs_for_get = pairs.clone();
    let bridge_for_get = bridge.clone();
    let get_fn = bridge.with_engine(|e| {
        e.create_function(
            "get",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                let found = pairs_for_get.borrow().iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());
                match found {
                    Some(v) => Ok(bridge.with_engine(|e| e.string(&v))),
                    None => Ok(bridge.with_engine(|e| e.null())),
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "get", get_fn));

    let pairs_for_get_all = pairs.clone();
    let bridge_for_get_all = bridge.clone();
    let get_all_fn = bridge.with_engine(|e| {
        e.create_function(
            "getAll",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get_all.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                let values: Vec<E::Value> = pairs_for_get_all
                    .borrow()
                    .iter()
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| bridge.with_engine(|e| e.string(v)))
                    .collect();
                Ok(bridge.with_engine(|e| e.create_array(&values)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "getAll", get_all_fn));

    let pairs_for_has = pairs.clone();
    let bridge_for_has = bridge.clone();
    let has_fn = bridge.with_engine(|e| {
        e.create_function(
            "has",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_has.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                let present = pairs_for_has.borrow().iter().any(|(k, _)| *k == key);
                Ok(bridge.with_engine(|e| e.boolean(present)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "has", has_fn));

    let pairs_for_delete = pairs.clone();
    let notify_for_delete = notify.clone();
    let bridge_for_delete = bridge.clone();
    let delete_fn = bridge.with_engine(|e| {
        e.create_function(
            "delete",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_delete.clone();
                let key = arg_string(&bridge, args, 0).unwrap_or_default();
                pairs_for_delete.borrow_mut().retain(|(k, _)| *k != key);
                notify_for_delete();
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "delete", delete_fn));

    let pairs_for_to_string = pairs;
    let bridge_for_to_string = bridge.clone();
    let to_string_fn = bridge.with_engine(|e| {
        e.create_function(
            "toString",
            0,
            Rc::new(move |_this, _args| {
                let serialized = encode_pairs(&pairs_for_to_string.borrow());
                Ok(bridge_for_to_string.with_engine(|e| e.string(&serialized)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "toString", to_string_fn));

    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_bridge;

    fn get<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str) -> E::Value {
        bridge.with_engine(|e| e.get_property(obj, key)).expect("property exists")
    }

    fn call<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, method: &str, args: &[E::Value]) -> Result<E::Value, E::Value> {
        let f = get(bridge, obj, method);
        bridge.with_engine(|e| e.call_function(&f, obj, args))
    }

    #[test]
    fn url_exposes_parsed_components() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let ctor = get(&bridge, &global, "URL");
        let undef = bridge.with_engine(|e| e.undefined());
        let input = bridge.with_engine(|e| e.string("https://example.com:8080/path?a=1#frag"));
        let url = bridge.with_engine(|e| e.call_function(&ctor, &undef, &[input])).unwrap();
        let pathname = get(&bridge, &url, "pathname");
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&pathname)), "/path");
        let port = get(&bridge, &url, "port");
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&port)), "8080");
        let hash = get(&bridge, &url, "hash");
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&hash)), "#frag");
    }

    #[test]
    fn url_rejects_unparseable_input() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let ctor = get(&bridge, &global, "URL");
        let undef = bridge.with_engine(|e| e.undefined());
        let input = bridge.with_engine(|e| e.string("not a url"));
        assert!(bridge.with_engine(|e| e.call_function(&ctor, &undef, &[input])).is_err());
    }

    #[test]
    fn mutating_search_params_updates_url_search() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let ctor = get(&bridge, &global, "URL");
        let undef = bridge.with_engine(|e| e.undefined());
        let input = bridge.with_engine(|e| e.string("https://example.com/"));
        let url = bridge.with_engine(|e| e.call_function(&ctor, &undef, &[input])).unwrap();
        let params = get(&bridge, &url, "searchParams");
        let key = bridge.with_engine(|e| e.string("q"));
        let value = bridge.with_engine(|e| e.string("rust"));
        call(&bridge, &params, "append", &[key, value]).unwrap();
        let search = get(&bridge, &url, "search");
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&search)), "?q=rust");
    }

    #[test]
    fn search_params_set_after_multiple_appends_keeps_first_position() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let ctor = get(&bridge, &global, "URLSearchParams");
        let undef = bridge.with_engine(|e| e.undefined());
        let params = bridge.with_engine(|e| e.call_function(&ctor, &undef, &[])).unwrap();
        let a = bridge.with_engine(|e| e.string("a"));
        let one = bridge.with_engine(|e| e.string("1"));
        call(&bridge, &params, "append", &[a.clone(), one]).unwrap();
        let two = bridge.with_engine(|e| e.string("2"));
        call(&bridge, &params, "append", &[a.clone(), two]).unwrap();
        let only = bridge.with_engine(|e| e.string("only"));
        call(&bridge, &params, "set", &[a.clone(), only]).unwrap();
        let all = call(&bridge, &params, "getAll", &[a]).unwrap();
        let len = bridge.with_engine(|e| e.array_length(&all)).unwrap();
        assert_eq!(len, 1);
        let first = bridge.with_engine(|e| e.array_get(&all, 0)).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&first)), "only");
    }

    #[test]
    fn search_params_has_reflects_deletions() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let ctor = get(&bridge, &global, "URLSearchParams");
        let undef = bridge.with_engine(|e| e.undefined());
        let params = bridge.with_engine(|e| e.call_function(&ctor, &undef, &[])).unwrap();
        let key = bridge.with_engine(|e| e.string("x"));
        let value = bridge.with_engine(|e| e.string("1"));
        call(&bridge, &params, "append", &[key.clone(), value]).unwrap();
        call(&bridge, &params, "delete", &[key.clone()]).unwrap();
        let has = call(&bridge, &params, "has", &[key]).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_bool(&has)), false);
    }
}
