//! Edge-collapse coarsening driver.
//!
//! One [`coarsen`] pass runs three phases over the mesh:
//!
//! 1. element-based screening: classification drops forbidden directions
//!    and the pass exits early when no rank has a candidate left;
//! 2. ghosted selection: topological admissibility, predicted cavity
//!    qualities, the quality filters, and an independent set of key
//!    vertices, all published as tags so every copy of a cavity agrees;
//! 3. element-based application: each key collapses along its rail and the
//!    mesh is rebuilt dimension by dimension with fresh global numbering.
//!
//! The inter-phase contract is carried entirely by mesh tags, which is what
//! lets phase boundaries double as partition migrations.

pub mod choose;
pub mod collapse;
pub mod indset;
pub mod modify;
pub mod quality;
pub mod rails;
pub mod topology;

use crate::algs::arrays::{collect_marked, each_neq_to, map_into, unmap};
use crate::coarsen::choose::choose_vertex_collapses;
use crate::coarsen::collapse::{
    check_collapse_class, check_collapse_exposure, filter_coarsen_candidates, DONT_COLLAPSE,
};
use crate::coarsen::indset::find_indset;
use crate::coarsen::modify::{modify_ents, ModifiedEnts};
use crate::coarsen::quality::{
    coarsen_qualities, filter_coarsen_improve, filter_coarsen_min_qual, NO_QUALITY,
};
use crate::coarsen::rails::{find_rails, get_verts_onto, mark_dead_ents};
use crate::coarsen::topology::{coarsen_topology, find_coarsen_domains};
use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::{Mesh, Partition, COORDINATES};

pub use crate::coarsen::collapse::CLASS_DIM;

/// Per-edge collapse permission code (i8, one component).
pub const COLLAPSE_CODE: &str = "collapse_code";
/// Per-edge predicted quality for each direction (f64, two components).
pub const COLLAPSE_QUALITIES: &str = "collapse_qualities";
/// Per-vertex independent-set membership (i8, one component).
pub const KEY: &str = "key";
/// Per-vertex best predicted quality (f64, one component).
pub const COLLAPSE_QUALITY: &str = "collapse_quality";

/// Read the candidate edges out of the code tag: the edges whose code
/// permits at least one direction, with their codes.
fn get_edge_codes(mesh: &Mesh) -> Result<(Vec<usize>, Vec<i8>), MeshCoarsenError> {
    let codes = mesh.get_array::<i8>(1, COLLAPSE_CODE)?;
    let cands2edges = collect_marked(&each_neq_to(codes, &DONT_COLLAPSE));
    let cand_codes = unmap(&cands2edges, codes, 1);
    Ok((cands2edges, cand_codes))
}

fn replace_tag<T: crate::data::TagValue>(
    mesh: &mut Mesh,
    d: usize,
    name: &str,
    ncomps: usize,
    values: Vec<T>,
) -> Result<(), MeshCoarsenError> {
    if mesh.has_tag(d, name) {
        mesh.remove_tag::<T>(d, name)?;
    }
    mesh.add_tag(d, name, ncomps, values)
}

fn put_edge_codes(
    mesh: &mut Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
) -> Result<(), MeshCoarsenError> {
    let mut codes = vec![DONT_COLLAPSE; mesh.nedges()];
    map_into(cand_codes, cands2edges, &mut codes, 1);
    replace_tag(mesh, 1, COLLAPSE_CODE, 1, codes)
}

fn put_edge_quals(
    mesh: &mut Mesh,
    cands2edges: &[usize],
    cand_quals: &[f64],
) -> Result<(), MeshCoarsenError> {
    let mut quals = vec![NO_QUALITY; mesh.nedges() * 2];
    map_into(cand_quals, cands2edges, &mut quals, 2);
    replace_tag(mesh, 1, COLLAPSE_QUALITIES, 2, quals)
}

/// First phase: classification screening with a global early exit.
/// Returns whether any rank still has a candidate.
pub fn coarsen_element_based1(mesh: &mut Mesh) -> Result<bool, MeshCoarsenError> {
    let (mut cands2edges, cand_codes) = get_edge_codes(mesh)?;
    let mut cand_codes = check_collapse_class(mesh, &cands2edges, &cand_codes)?;
    filter_coarsen_candidates(&mut cands2edges, &mut cand_codes, None);
    log::debug!("screening kept {} candidate edges", cands2edges.len());
    put_edge_codes(mesh, &cands2edges, &cand_codes)?;
    Ok(!mesh.comm().allreduce_and(cands2edges.is_empty()))
}

/// Second phase, run ghosted: admissibility, quality filters and key
/// selection. Publishes the key, quality and code tags and re-owns each
/// key's cavity to a single rank. Returns whether any key was selected.
pub fn coarsen_ghosted(
    mesh: &mut Mesh,
    min_qual: f64,
    improve: bool,
) -> Result<bool, MeshCoarsenError> {
    let (mut cands2edges, cand_codes) = get_edge_codes(mesh)?;
    let mut cand_codes = check_collapse_exposure(mesh, &cands2edges, &cand_codes)?;
    filter_coarsen_candidates(&mut cands2edges, &mut cand_codes, None);
    if mesh.comm().allreduce_and(cands2edges.is_empty()) {
        return Ok(false);
    }
    let mut cand_quals = coarsen_qualities(mesh, &cands2edges, &cand_codes)?;
    cand_codes = filter_coarsen_min_qual(min_qual, &cand_codes, &cand_quals);
    if improve {
        cand_codes = filter_coarsen_improve(mesh, &cands2edges, &cand_codes, &cand_quals)?;
    }
    filter_coarsen_candidates(&mut cands2edges, &mut cand_codes, Some(&mut cand_quals));
    log::debug!("quality filters kept {} candidate edges", cands2edges.len());
    if mesh.comm().allreduce_and(cands2edges.is_empty()) {
        return Ok(false);
    }
    let (marks, vert_quals) =
        choose_vertex_collapses(mesh, &cands2edges, &cand_codes, &cand_quals)?;
    let indset = find_indset(mesh, &marks, &vert_quals)?;
    let keys2verts: Vec<usize> = indset
        .iter()
        .enumerate()
        .filter_map(|(v, &sel)| sel.then_some(v))
        .collect();
    log::debug!("selected {} key vertices", keys2verts.len());
    replace_tag(
        mesh,
        0,
        KEY,
        1,
        indset.iter().map(|&sel| sel as i8).collect(),
    )?;
    replace_tag(mesh, 0, COLLAPSE_QUALITY, 1, vert_quals)?;
    put_edge_codes(mesh, &cands2edges, &cand_codes)?;
    put_edge_quals(mesh, &cands2edges, &cand_quals)?;
    mesh.set_owners_by_indset(0, &keys2verts)?;
    Ok(true)
}

/// Third phase: apply the selected collapses and replace the mesh.
pub fn coarsen_element_based2(mesh: &mut Mesh) -> Result<(), MeshCoarsenError> {
    if mesh.has_tag(1, COLLAPSE_QUALITIES) && !mesh.has_tag(1, COLLAPSE_CODE) {
        return Err(MeshCoarsenError::QualitiesWithoutCodes);
    }
    let dim = mesh.dim();
    let key_flags = mesh.remove_tag::<i8>(0, KEY)?;
    let vert_quals = mesh.remove_tag::<f64>(0, COLLAPSE_QUALITY)?;
    let edge_codes = mesh.remove_tag::<i8>(1, COLLAPSE_CODE)?;
    let edge_quals = mesh.remove_tag::<f64>(1, COLLAPSE_QUALITIES)?;
    let keys2verts: Vec<usize> = key_flags
        .iter()
        .enumerate()
        .filter_map(|(v, &flag)| (flag != 0).then_some(v))
        .collect();

    let (rails2edges, rails2eev) =
        find_rails(mesh, &keys2verts, &vert_quals, &edge_codes, &edge_quals)?;
    let verts_onto = get_verts_onto(mesh, &rails2edges, &rails2eev)?;
    let dead = mark_dead_ents(mesh, &keys2verts, &rails2edges, &rails2eev)?;

    let mut new = mesh.new_like();
    let no_prods = vec![0usize; keys2verts.len() + 1];
    let verts_out = modify_ents(mesh, &mut new, 0, &keys2verts, &no_prods, &[], None)?;
    transfer_vert_tags(mesh, &mut new, &verts_out)?;
    for d in 1..=dim {
        let domains = find_coarsen_domains(mesh, d, &keys2verts, &dead[d - 1])?;
        let prods2new_verts = coarsen_topology(
            mesh,
            d,
            &keys2verts,
            &verts_onto,
            &domains,
            &verts_out.old_ents2new_ents,
        )?;
        let out = modify_ents(
            mesh,
            &mut new,
            d,
            &keys2verts,
            domains.offsets(),
            &prods2new_verts,
            Some(&verts_out.old_ents2new_ents),
        )?;
        transfer_class_dim(mesh, &mut new, d, &out, domains.items())?;
    }
    *mesh = new;
    Ok(())
}

/// Carry coordinates and classification onto the surviving vertices. All
/// new vertices are survivors, so a gather through the old indices is
/// enough. Other vertex tags do not outlive the pass.
fn transfer_vert_tags(
    old: &Mesh,
    new: &mut Mesh,
    verts_out: &ModifiedEnts,
) -> Result<(), MeshCoarsenError> {
    if old.has_tag(0, COORDINATES) {
        let width = old.tag_ncomps(0, COORDINATES)?;
        let coords = unmap(
            &verts_out.same_ents2old_ents,
            old.get_array::<f64>(0, COORDINATES)?,
            width,
        );
        new.add_tag(0, COORDINATES, width, coords)?;
    }
    if old.has_tag(0, CLASS_DIM) {
        let class = unmap(
            &verts_out.same_ents2old_ents,
            old.get_array::<i8>(0, CLASS_DIM)?,
            1,
        );
        new.add_tag(0, CLASS_DIM, 1, class)?;
    }
    Ok(())
}

/// Classification above the vertices: survivors keep theirs, products
/// inherit from the domain entity they replace.
fn transfer_class_dim(
    old: &Mesh,
    new: &mut Mesh,
    d: usize,
    out: &ModifiedEnts,
    prods2old_ents: &[usize],
) -> Result<(), MeshCoarsenError> {
    if !old.has_tag(d, CLASS_DIM) {
        return Ok(());
    }
    let old_class = old.get_array::<i8>(d, CLASS_DIM)?;
    let mut class = unmap(&out.same_ents2old_ents, old_class, 1);
    class.extend(prods2old_ents.iter().map(|&e| old_class[e]));
    new.add_tag(d, CLASS_DIM, 1, class)
}

/// One coarsening pass: collapse a maximal independent set of admissible
/// edges whose predicted cavity quality reaches `min_qual` (strictly
/// improves the cavity when `improve` is set). Returns whether the mesh
/// changed. Collective.
pub fn coarsen(
    mesh: &mut Mesh,
    min_qual: f64,
    improve: bool,
) -> Result<bool, MeshCoarsenError> {
    mesh.set_partition(Partition::ElementBased);
    if !coarsen_element_based1(mesh)? {
        mesh.remove_tag::<i8>(1, COLLAPSE_CODE)?;
        return Ok(false);
    }
    mesh.set_partition(Partition::Ghosted);
    mesh.sync_tag(1, COLLAPSE_CODE)?;
    if !coarsen_ghosted(mesh, min_qual, improve)? {
        mesh.remove_tag::<i8>(1, COLLAPSE_CODE)?;
        mesh.set_partition(Partition::ElementBased);
        return Ok(false);
    }
    mesh.set_partition(Partition::ElementBased);
    coarsen_element_based2(mesh)?;
    Ok(true)
}

/// Derive edge collapse codes from per-vertex removal marks and run one
/// coarsening pass. A marked vertex may slide along any incident edge.
pub fn coarsen_by_vertex_marks(
    mesh: &mut Mesh,
    vert_marks: &[bool],
    min_qual: f64,
    improve: bool,
) -> Result<bool, MeshCoarsenError> {
    if vert_marks.len() != mesh.nverts() {
        return Err(MeshCoarsenError::ArrayLengthMismatch {
            dim: 0,
            name: "vertex marks".into(),
            expected: mesh.nverts(),
            found: vert_marks.len(),
        });
    }
    let codes: Vec<i8> = mesh
        .verts_of(1)?
        .chunks_exact(2)
        .map(|ev| {
            let mut code = DONT_COLLAPSE;
            for (eev, &v) in ev.iter().enumerate() {
                if vert_marks[v] {
                    code |= 1 << eev;
                }
            }
            code
        })
        .collect();
    replace_tag(mesh, 1, COLLAPSE_CODE, 1, codes)?;
    coarsen(mesh, min_qual, improve)
}
