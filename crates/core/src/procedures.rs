//! Built-in procedure reference data.
//!
//! This is the single step list used by the live assistant; nothing else keeps
//! its own copy. Durations are in seconds.

use crate::catalogue::{Procedure, ProcedureStep};
use std::collections::BTreeMap;

fn rubric(straightforward: &str, moderate: &str, complex: &str) -> BTreeMap<u8, String> {
    BTreeMap::from([
        (1, straightforward.to_string()),
        (2, moderate.to_string()),
        (3, complex.to_string()),
    ])
}

fn cholecystectomy() -> Procedure {
    Procedure {
        id: "cholecystectomy".to_string(),
        name: "Robotic Cholecystectomy".to_string(),
        steps: vec![
            ProcedureStep::new("portPlacement", "Port Placement", 300, 600)
                .with_aliases(&["placing the ports", "trocar placement"])
                .with_cue("veress", "insufflation being set up"),
            ProcedureStep::new("robotDocking", "Docking the robot", 180, 600)
                .with_aliases(&["docking", "robot docking", "dock the robot"])
                .with_cue("robot", "requests to move the robot")
                .with_cue("dock", "requests to dock"),
            ProcedureStep::new(
                "calotTriangleDissection",
                "Dissection of Calot's Triangle",
                600,
                1500,
            )
            .with_aliases(&["calots triangle", "calot triangle", "critical view of safety"])
            .with_cue("retract the fundus", "retraction of the fundus")
            .with_cue("hook", "a request for the hook"),
            ProcedureStep::new(
                "clipAndDivide",
                "Clipping and division of Cystic Artery and Duct",
                300,
                900,
            )
            .with_aliases(&["clipping", "clip and divide", "cystic duct", "cystic artery"])
            .with_cue("clip applier", "a request for the clip applier")
            .with_cue("clips", "a request for clips"),
            ProcedureStep::new(
                "gallbladderDissection",
                "Gallbladder Dissection off the Liver",
                600,
                1500,
            )
            .with_aliases(&["gallbladder dissection", "off the liver", "liver bed"])
            .with_cue("spatula", "a request for the spatula"),
            ProcedureStep::new("specimenRemoval", "Specimen Removal", 180, 600)
                .with_aliases(&["specimen", "specimen bag", "extraction"])
                .with_cue("endocatch", "a request for the retrieval bag")
                .with_cue("undock", "requests to undock the robot"),
            ProcedureStep::new("portClosure", "Port Closure", 300, 900)
                .with_aliases(&["closing the ports", "fascial closure"])
                .with_cue("gas off", "the insufflation being turned off")
                .with_cue("lights on", "the room lights coming on"),
            ProcedureStep::new("skinClosure", "Skin Closure", 180, 600)
                .with_aliases(&["closing the skin", "closing skin"])
                .with_cue("dermabond", "a request for skin glue")
                .with_cue("monocryl", "a request for the skin suture"),
        ],
        difficulty_rubric: rubric(
            "Minimal inflammation, clear anatomy, critical view obtained without difficulty.",
            "Moderate inflammation or adhesions requiring additional dissection.",
            "Severe inflammation, distorted anatomy, or bail-out strategy required.",
        ),
    }
}

fn inguinal_hernia_tep() -> Procedure {
    Procedure {
        id: "inguinalHerniaTep".to_string(),
        name: "Robotic Inguinal Hernia Repair (TEP)".to_string(),
        steps: vec![
            ProcedureStep::new("preperitonealAccess", "Preperitoneal Access", 300, 900)
                .with_aliases(&["access", "balloon dissector"])
                .with_cue("balloon", "a request for the balloon dissector"),
            ProcedureStep::new("robotDocking", "Docking the robot", 180, 600)
                .with_aliases(&["docking", "robot docking", "dock the robot"])
                .with_cue("robot", "requests to move the robot")
                .with_cue("dock", "requests to dock"),
            ProcedureStep::new("spaceCreation", "Creation of the Preperitoneal Space", 600, 1500)
                .with_aliases(&["space creation", "retzius", "space of retzius"])
                .with_cue("pubic tubercle", "dissection toward the pubic tubercle"),
            ProcedureStep::new("herniaReduction", "Hernia Sac Reduction", 600, 1500)
                .with_aliases(&["reducing the sac", "sac reduction", "hernia sac"])
                .with_cue("cord structures", "work on the cord structures"),
            ProcedureStep::new("meshPlacement", "Mesh Placement", 300, 900)
                .with_aliases(&["mesh", "placing the mesh"])
                .with_cue("mesh", "a request for the mesh")
                .with_cue("tacker", "a request for the tacker"),
            ProcedureStep::new("desufflationClosure", "Desufflation and Closure", 300, 900)
                .with_aliases(&["desufflation", "closing"])
                .with_cue("gas off", "the insufflation being turned off")
                .with_cue("lights on", "the room lights coming on"),
        ],
        difficulty_rubric: rubric(
            "Primary unilateral hernia with easily developed planes.",
            "Large or bilateral hernia, or moderate scarring of the preperitoneal plane.",
            "Recurrent hernia after prior preperitoneal repair or incarcerated contents.",
        ),
    }
}

fn appendectomy() -> Procedure {
    Procedure {
        id: "appendectomy".to_string(),
        name: "Laparoscopic Appendectomy".to_string(),
        steps: vec![
            ProcedureStep::new("portPlacement", "Port Placement", 300, 600)
                .with_aliases(&["placing the ports", "trocar placement"]),
            ProcedureStep::new("appendixMobilization", "Mobilization of the Appendix", 300, 900)
                .with_aliases(&["mobilization", "mobilizing the appendix"])
                .with_cue("atraumatic grasper", "a request for the atraumatic grasper"),
            ProcedureStep::new("mesoappendixDivision", "Division of the Mesoappendix", 300, 900)
                .with_aliases(&["mesoappendix", "mesentery"])
                .with_cue("ligasure", "a request for the vessel sealer")
                .with_cue("vessel sealer", "a request for the vessel sealer"),
            ProcedureStep::new("appendixDivision", "Division of the Appendix Base", 180, 600)
                .with_aliases(&["appendix base", "stapling the base"])
                .with_cue("stapler", "a request for the stapler")
                .with_cue("endoloop", "a request for the endoloop"),
            ProcedureStep::new("specimenRemoval", "Specimen Removal", 120, 420)
                .with_aliases(&["specimen", "specimen bag", "extraction"])
                .with_cue("endocatch", "a request for the retrieval bag"),
            ProcedureStep::new("portClosure", "Port Closure", 300, 900)
                .with_aliases(&["closing the ports", "fascial closure"])
                .with_cue("gas off", "the insufflation being turned off")
                .with_cue("lights on", "the room lights coming on"),
        ],
        difficulty_rubric: rubric(
            "Non-perforated appendix in normal position.",
            "Retrocecal position or localized inflammation.",
            "Perforation, abscess, or phlegmon requiring extensive dissection.",
        ),
    }
}

pub fn builtin_procedures() -> Vec<Procedure> {
    vec![cholecystectomy(), inguinal_hernia_tep(), appendectomy()]
}
