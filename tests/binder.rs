//! Texture binding tests

use std::sync::Arc;

use model_viewer::asset::MaterialBinder;
use model_viewer::resources::{Texture, TextureChannel, TextureSlot, TextureTable};

fn table(entries: &[&str]) -> TextureTable {
    let mut table = TextureTable::new();
    for path in entries {
        table.insert(*path, Texture::solid_color([255, 255, 255, 255], path).into_handle());
    }
    table
}

#[test]
fn windows_reference_matches_zip_path() {
    let textures = table(&["textures/wood_diffuse.png"]);
    let library = MaterialBinder::bind(
        "newmtl wood\nmap_Kd C:\\assets\\textures\\wood_diffuse.png\n",
        &textures,
    );

    let material = library.get("wood").unwrap();
    let bound = material.texture(TextureChannel::Diffuse).and_then(TextureSlot::texture).unwrap();
    assert!(Arc::ptr_eq(bound, textures.get("textures/wood_diffuse.png").unwrap()));
}

#[test]
fn unmatched_reference_stays_raw() {
    let textures = table(&["textures/wood_diffuse.png"]);
    let library = MaterialBinder::bind(
        "newmtl m\nmap_Ks gloss.png\nmap_Kd wood_diffuse.png\n",
        &textures,
    );

    let material = library.get("m").unwrap();
    assert_eq!(
        material.texture(TextureChannel::Specular).and_then(TextureSlot::reference),
        Some("gloss.png")
    );
    assert!(material.texture(TextureChannel::Diffuse).unwrap().is_bound());
}

#[test]
fn options_before_file_name_are_skipped() {
    let textures = table(&["maps/bump.png", "maps/base.png"]);
    let library = MaterialBinder::bind(
        "newmtl m\nmap_bump -bm 0.5 maps/bump.png\nmap_Kd -s 2 2 1 -clamp on base.png\n",
        &textures,
    );

    let material = library.get("m").unwrap();
    assert!(material.texture(TextureChannel::Bump).unwrap().is_bound());
    assert!(material.texture(TextureChannel::Diffuse).unwrap().is_bound());
}

#[test]
fn first_match_in_table_order_wins() {
    let textures = table(&["a/tex.png", "b/tex.png"]);
    let library = MaterialBinder::bind("newmtl m\nmap_Kd tex.png\n", &textures);

    let bound = library
        .get("m")
        .and_then(|m| m.texture(TextureChannel::Diffuse))
        .and_then(TextureSlot::texture)
        .unwrap();
    assert_eq!(bound.name, "a/tex.png");
}

#[test]
fn every_channel_binds() {
    let textures = table(&["t.png"]);
    let mtl: String = std::iter::once("newmtl all\n".to_string())
        .chain(TextureChannel::ALL.iter().map(|c| format!("{} t.png\n", c.keyword())))
        .collect();
    let library = MaterialBinder::bind(&mtl, &textures);

    let material = library.get("all").unwrap();
    for channel in TextureChannel::ALL {
        assert!(
            material.texture(channel).is_some_and(TextureSlot::is_bound),
            "{channel:?} not bound"
        );
    }
}
